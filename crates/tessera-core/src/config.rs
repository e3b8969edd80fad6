//! Engine configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `TESSERA_RAW_OUTPUT_PREFIX` | `file:///tmp/tessera/raw` | root under which encoders mint output directories |
//! | `TESSERA_LOG_FORMAT` | `pretty` | `json` or `pretty` |

use crate::error::{Error, Result};
use crate::observability::LogFormat;

/// Environment variable holding the raw output prefix.
pub const RAW_OUTPUT_PREFIX_VAR: &str = "TESSERA_RAW_OUTPUT_PREFIX";
/// Environment variable holding the log format.
pub const LOG_FORMAT_VAR: &str = "TESSERA_LOG_FORMAT";

const DEFAULT_RAW_OUTPUT_PREFIX: &str = "file:///tmp/tessera/raw";

/// Runtime configuration for dataset encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// URI prefix for minted output directories.
    pub raw_output_prefix: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            raw_output_prefix: DEFAULT_RAW_OUTPUT_PREFIX.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_env_values(
            env_string(RAW_OUTPUT_PREFIX_VAR).as_deref(),
            env_string(LOG_FORMAT_VAR).as_deref(),
        )
    }

    fn from_env_values(raw_output_prefix: Option<&str>, log_format: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(prefix) = raw_output_prefix {
            config.raw_output_prefix = normalize_prefix(prefix)?;
        }
        if let Some(format) = log_format {
            config.log_format = parse_log_format(LOG_FORMAT_VAR, format)?;
        }

        Ok(config)
    }

    /// Overrides the raw output prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the prefix is empty.
    pub fn with_raw_output_prefix(mut self, prefix: &str) -> Result<Self> {
        self.raw_output_prefix = normalize_prefix(prefix)?;
        Ok(self)
    }
}

fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.trim();
    let normalized = if trimmed.ends_with(":///") || trimmed == "/" {
        trimmed
    } else {
        trimmed.trim_end_matches('/')
    };
    if normalized.is_empty() {
        return Err(Error::Config(format!(
            "{RAW_OUTPUT_PREFIX_VAR} must not be empty"
        )));
    }
    Ok(normalized.to_string())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_log_format(name: &str, value: &str) -> Result<LogFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" | "text" => Ok(LogFormat::Pretty),
        other => Err(Error::Config(format!(
            "{name} must be 'json' or 'pretty', got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = EngineConfig::from_env_values(None, None).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.raw_output_prefix, "file:///tmp/tessera/raw");
    }

    #[test]
    fn prefix_loses_trailing_slash() {
        let config = EngineConfig::from_env_values(Some("s3://bucket/raw/"), None).unwrap();
        assert_eq!(config.raw_output_prefix, "s3://bucket/raw");
    }

    #[test]
    fn log_format_is_case_insensitive() {
        let config = EngineConfig::from_env_values(None, Some("JSON")).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            EngineConfig::from_env_values(None, Some("xml")),
            Err(Error::Config(_))
        ));
        assert!(EngineConfig::default().with_raw_output_prefix("  ").is_err());
    }
}
