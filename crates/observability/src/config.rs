use std::str::FromStr;

use thiserror::Error;

const DEFAULT_FILTER: &str = "info";

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (default; suited to log shipping).
    #[default]
    Json,
    /// Multi-line human-readable output for local development.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log format `{0}` (expected `json` or `pretty`)")]
pub struct ParseLogFormatError(pub String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ParseLogFormatError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives, e.g. `info,forgelend_infra=debug`.
    pub filter: String,
    pub format: LogFormat,
    /// Route output through the test harness capture instead of stdout.
    pub test_writer: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            test_writer: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read `RUST_LOG` and `FORGELEND_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ParseLogFormatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ParseLogFormatError> {
        let filter = lookup("RUST_LOG")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = match lookup("FORGELEND_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };
        Ok(Self {
            filter,
            format,
            test_writer: false,
        })
    }

    /// Same configuration, logging through `libtest`'s captured output.
    pub fn with_test_writer(self) -> Self {
        Self {
            test_writer: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json_at_info() {
        let config = ObservabilityConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ObservabilityConfig::default());
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn reads_filter_and_format() {
        let config = ObservabilityConfig::from_lookup(|key| match key {
            "RUST_LOG" => Some("debug,forgelend_pool=trace".to_string()),
            "FORGELEND_LOG_FORMAT" => Some(" Pretty ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.filter, "debug,forgelend_pool=trace");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn blank_filter_falls_back() {
        let config =
            ObservabilityConfig::from_lookup(|key| (key == "RUST_LOG").then(|| "  ".to_string()))
                .unwrap();
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn test_writer_is_opt_in() {
        let config = ObservabilityConfig::from_lookup(|_| None).unwrap();
        assert!(!config.test_writer);
        let config = config.with_test_writer();
        assert!(config.test_writer);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert_eq!(err, ParseLogFormatError("xml".to_string()));
    }
}
