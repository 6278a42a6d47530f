//! Typo-tolerant token matching.

/// Edits allowed for a query token of `len` characters.
pub fn max_distance(len: usize) -> usize {
    match len {
        0..=2 => 0,
        3..=4 => 1,
        5..=8 => 2,
        _ => len / 4,
    }
}

/// Whether `query_token` matches `candidate` within the allowance for its length.
pub fn token_matches(query_token: &str, candidate: &str) -> bool {
    if candidate.contains(query_token) {
        return true;
    }
    let limit = max_distance(query_token.chars().count());
    limit > 0
        && query_token.chars().count().abs_diff(candidate.chars().count()) <= limit
        && strsim::levenshtein(query_token, candidate) <= limit
}

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
