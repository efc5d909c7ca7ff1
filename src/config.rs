use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::error::{ImporterError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub oracle: OracleConfig,
    pub dedupe: DedupeSettings,
    pub interpolation: InterpolationConfig,
    pub reporting: ReportingConfig,
    pub osm: OsmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_ORACLE_URL.to_string(),
            timeout_seconds: constants::DEFAULT_ORACLE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupeSettings {
    pub batch_size: usize,
    pub max_in_flight: usize,
}

impl Default for DedupeSettings {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_in_flight: constants::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Perpendicular distance of interpolated points from the centerline, in degrees
    pub offset_degrees: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            offset_degrees: constants::DEFAULT_OFFSET_DEGREES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub interval_seconds: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: constants::DEFAULT_PROGRESS_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OsmConfig {
    pub projection: Projection,
}

/// Coordinate reference system of decoded OSM node positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    Wgs84,
    WebMercator,
}

impl FromStr for Projection {
    type Err = ImporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wgs84" | "epsg:4326" => Ok(Projection::Wgs84),
            "web_mercator" | "webmercator" | "epsg:3857" => Ok(Projection::WebMercator),
            other => Err(ImporterError::Config(format!("Unknown projection '{}'", other))),
        }
    }
}

impl ImporterConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error when `path` is `None`; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    ImporterError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DEDUPE_ORACLE_URL") {
            self.oracle.base_url = url;
        }
        if let Some(size) = env_parse::<usize>("DEDUPE_BATCH_SIZE")? {
            self.dedupe.batch_size = size;
        }
        if let Some(max) = env_parse::<usize>("DEDUPE_MAX_IN_FLIGHT")? {
            self.dedupe.max_in_flight = max;
        }
        if let Some(offset) = env_parse::<f64>("TIGER_OFFSET_DEGREES")? {
            self.interpolation.offset_degrees = offset;
        }
        if let Some(secs) = env_parse::<u64>("PROGRESS_INTERVAL_SECS")? {
            self.reporting.interval_seconds = secs;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dedupe.batch_size == 0 {
            return Err(ImporterError::Config("dedupe.batch_size must be at least 1".into()));
        }
        if self.dedupe.max_in_flight == 0 {
            return Err(ImporterError::Config("dedupe.max_in_flight must be at least 1".into()));
        }
        let offset = self.interpolation.offset_degrees;
        if !offset.is_finite() || offset < 0.0 {
            return Err(ImporterError::Config(format!(
                "interpolation.offset_degrees must be a non-negative number, got {}",
                offset
            )));
        }
        if self.reporting.interval_seconds == 0 {
            return Err(ImporterError::Config("reporting.interval_seconds must be at least 1".into()));
        }
        if self.oracle.base_url.trim().is_empty() {
            return Err(ImporterError::Config("oracle.base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_seconds)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.reporting.interval_seconds)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ImporterError::Config(format!("Invalid value for {}: '{}'", key, raw))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ImporterConfig::default();
        assert_eq!(config.dedupe.batch_size, 50);
        assert_eq!(config.dedupe.max_in_flight, 100);
        assert_eq!(config.interpolation.offset_degrees, 0.00015);
        assert_eq!(config.oracle.base_url, "http://localhost:5000");
        assert_eq!(config.osm.projection, Projection::Wgs84);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ImporterConfig::from_toml_str(
            r#"
            [dedupe]
            batch_size = 10

            [osm]
            projection = "web_mercator"
            "#,
        )
        .unwrap();

        assert_eq!(config.dedupe.batch_size, 10);
        assert_eq!(config.dedupe.max_in_flight, 100);
        assert_eq!(config.osm.projection, Projection::WebMercator);
        assert_eq!(config.reporting.interval_seconds, 10);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = ImporterConfig::default();
        config.dedupe.batch_size = 0;
        assert!(matches!(config.validate(), Err(ImporterError::Config(_))));

        let mut config = ImporterConfig::default();
        config.dedupe.max_in_flight = 0;
        assert!(config.validate().is_err());

        let mut config = ImporterConfig::default();
        config.interpolation.offset_degrees = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_projection_from_str() {
        assert_eq!("EPSG:3857".parse::<Projection>().unwrap(), Projection::WebMercator);
        assert_eq!("wgs84".parse::<Projection>().unwrap(), Projection::Wgs84);
        assert!("mollweide".parse::<Projection>().is_err());
    }
}
