//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ics::ExportOptions;
use crate::search::SearchOptions;
use crate::timezone::DEFAULT_CACHE_CAPACITY;

const ENV_PREFIX: &str = "LIGHTNING";

/// Settings for one `Calendar`.
///
/// Sources, lowest precedence first: built-in defaults, an optional TOML file,
/// then `LIGHTNING_*` environment variables (`__` separates nested keys, e.g.
/// `LIGHTNING_SEARCH__FUZZY=true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone applied to input that names none.
    pub default_timezone: String,
    pub timezone_cache_capacity: usize,
    pub search: SearchOptions,
    pub ics: ExportOptions,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            default_timezone: "UTC".to_string(),
            timezone_cache_capacity: DEFAULT_CACHE_CAPACITY,
            search: SearchOptions::default(),
            ics: ExportOptions::default(),
        }
    }
}

impl CalendarConfig {
    /// `<config dir>/lightning/config.toml`
    pub fn config_path() -> EngineResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EngineError::Config("Could not determine config directory".into()))?
            .join("lightning");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (if it exists) and the environment.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Loading calendar config");
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<CalendarConfig>()?;
        Ok(config)
    }

    /// Load from the default config path and the environment.
    pub fn load_default() -> EngineResult<Self> {
        let path = Self::config_path().ok();
        Self::load(path.as_deref())
    }

    /// Parse TOML text layered over the defaults.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config = Self::defaults()?
            .add_source(::config::File::from_str(content, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize::<CalendarConfig>()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    fn defaults() -> EngineResult<::config::ConfigBuilder<::config::builder::DefaultState>> {
        let defaults = CalendarConfig::default();
        Ok(::config::Config::builder()
            .set_default("default_timezone", defaults.default_timezone)?
            .set_default(
                "timezone_cache_capacity",
                defaults.timezone_cache_capacity as u64,
            )?
            .set_default("search.fuzzy", defaults.search.fuzzy)?
            .set_default("ics.product_id", defaults.ics.product_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::EventField;

    #[test]
    fn test_defaults() {
        let config = CalendarConfig::default();
        assert_eq!(config.default_timezone, "UTC");
        assert_eq!(config.timezone_cache_capacity, 1024);
        assert!(!config.search.fuzzy);
        assert_eq!(
            config.search.fields,
            [EventField::Title, EventField::Description, EventField::Location]
        );
        assert_eq!(config.ics.product_id, "-//Lightning Calendar//Core//EN");
    }

    #[test]
    fn test_from_toml_overrides_some_keys() {
        let config = CalendarConfig::from_toml_str(
            r#"
default_timezone = "America/New_York"

[search]
fuzzy = true
fields = ["title", "categories"]

[ics]
calendar_name = "Work"
"#,
        )
        .unwrap();

        assert_eq!(config.default_timezone, "America/New_York");
        assert_eq!(config.timezone_cache_capacity, 1024);
        assert!(config.search.fuzzy);
        assert_eq!(
            config.search.fields,
            [EventField::Title, EventField::Categories]
        );
        assert_eq!(config.ics.calendar_name.as_deref(), Some("Work"));
        assert_eq!(config.ics.product_id, "-//Lightning Calendar//Core//EN");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = CalendarConfig::default();
        config.default_timezone = "Asia/Tokyo".into();
        config.search.fuzzy = true;

        let text = config.to_toml().unwrap();
        assert_eq!(CalendarConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        let err = CalendarConfig::from_toml_str("default_timezone = [").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_config_path_ends_with_app_dir() {
        if let Ok(path) = CalendarConfig::config_path() {
            assert!(path.ends_with("lightning/config.toml"));
        }
    }
}
