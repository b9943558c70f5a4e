//! Server configuration
//!
//! Configuration is read once at startup from `CU_MCP_*` environment
//! variables. Out-of-range numbers are clamped and unparsable values fall
//! back to their defaults with a warning on stderr.
//!
//! | Variable | Default | Range |
//! |----------|---------|-------|
//! | `CU_MCP_MAX_SCREENSHOT_EDGE` | 1920 | 0..=10000 (0 disables resampling) |
//! | `CU_MCP_SCREENSHOT_PNG_COMPRESS_LEVEL` | 6 | 0..=9 |
//! | `CU_MCP_LOG_TO_STDERR` | enabled | `0`, `false`, `no` disable |
//! | `CU_MCP_LOG_MAX_STRING` | 300 | 32..=10000 |
//! | `CU_MCP_TOOL_TIMEOUT_SECS` | 600 | 1..=3600 |
//! | `CU_MCP_BACKEND` | `system` | `system`, `mock` |

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable holding the screenshot edge cap
pub const ENV_MAX_SCREENSHOT_EDGE: &str = "CU_MCP_MAX_SCREENSHOT_EDGE";
/// Environment variable holding the PNG compression level
pub const ENV_PNG_COMPRESS_LEVEL: &str = "CU_MCP_SCREENSHOT_PNG_COMPRESS_LEVEL";
/// Environment variable toggling the execution log
pub const ENV_LOG_TO_STDERR: &str = "CU_MCP_LOG_TO_STDERR";
/// Environment variable holding the log string truncation limit
pub const ENV_LOG_MAX_STRING: &str = "CU_MCP_LOG_MAX_STRING";
/// Environment variable holding the per-request timeout
pub const ENV_TOOL_TIMEOUT_SECS: &str = "CU_MCP_TOOL_TIMEOUT_SECS";
/// Environment variable selecting the provider backend
pub const ENV_BACKEND: &str = "CU_MCP_BACKEND";

const DEFAULT_MAX_SCREENSHOT_EDGE: u32 = 1920;
const DEFAULT_PNG_COMPRESS_LEVEL: u8 = 6;
const DEFAULT_LOG_MAX_STRING: usize = 300;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;

/// Rejected configuration value
///
/// Never fatal: the offending setting falls back to its default and the
/// error is logged as a warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Value is not an integer
    #[error("{name}={value:?} is not an integer")]
    NotAnInteger {
        /// Variable name
        name: String,
        /// Rejected value
        value: String,
    },

    /// Value names no known backend
    #[error("{name}={value:?} is not a known backend (expected 'system' or 'mock')")]
    UnknownBackend {
        /// Variable name
        name: String,
        /// Rejected value
        value: String,
    },
}

/// Which provider implementations back the tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real desktop providers for the host platform
    #[default]
    System,
    /// In-memory desktop that records every call
    Mock,
}

impl BackendKind {
    /// Returns the backend name
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::System => "system",
            BackendKind::Mock => "mock",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(BackendKind::System),
            "mock" => Ok(BackendKind::Mock),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Runtime configuration shared by the dispatcher, logger and tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Longest screenshot edge in pixels; 0 disables resampling
    pub max_screenshot_edge: u32,
    /// PNG compression level, 0 (fastest) to 9 (smallest)
    pub png_compress_level: u8,
    /// Whether the execution log is written to stderr
    pub log_enabled: bool,
    /// Truncation threshold for strings in log entries
    pub log_max_string: usize,
    /// Per-request handler timeout
    pub tool_timeout: Duration,
    /// Provider backend
    pub backend: BackendKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_screenshot_edge: DEFAULT_MAX_SCREENSHOT_EDGE,
            png_compress_level: DEFAULT_PNG_COMPRESS_LEVEL,
            log_enabled: true,
            log_max_string: DEFAULT_LOG_MAX_STRING,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            backend: BackendKind::System,
        }
    }
}

impl ServerConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through a custom variable lookup
    ///
    /// This is the testable core of [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_screenshot_edge = int_setting(
            &lookup,
            ENV_MAX_SCREENSHOT_EDGE,
            i64::from(defaults.max_screenshot_edge),
            0,
            10_000,
        );
        let png_compress_level = int_setting(
            &lookup,
            ENV_PNG_COMPRESS_LEVEL,
            i64::from(defaults.png_compress_level),
            0,
            9,
        );
        let log_max_string = int_setting(
            &lookup,
            ENV_LOG_MAX_STRING,
            DEFAULT_LOG_MAX_STRING as i64,
            32,
            10_000,
        );
        let tool_timeout_secs = int_setting(
            &lookup,
            ENV_TOOL_TIMEOUT_SECS,
            DEFAULT_TOOL_TIMEOUT_SECS as i64,
            1,
            3600,
        );

        let log_enabled = match lookup(ENV_LOG_TO_STDERR) {
            Some(value) => !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no"
            ),
            None => defaults.log_enabled,
        };

        let backend = match lookup(ENV_BACKEND).map(|value| parse_backend(ENV_BACKEND, &value)) {
            Some(Ok(backend)) => backend,
            Some(Err(e)) => {
                warn!("Ignoring {}, using '{}'", e, defaults.backend);
                defaults.backend
            }
            None => defaults.backend,
        };

        // Clamped ranges above fit the narrower types.
        Self {
            max_screenshot_edge: max_screenshot_edge as u32,
            png_compress_level: png_compress_level as u8,
            log_enabled,
            log_max_string: log_max_string as usize,
            tool_timeout: Duration::from_secs(tool_timeout_secs as u64),
            backend,
        }
    }

    /// Starts a builder seeded with defaults
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServerConfig`], mainly for tests and embedding
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Sets the screenshot edge cap (0 disables resampling)
    pub fn max_screenshot_edge(mut self, edge: u32) -> Self {
        self.config.max_screenshot_edge = edge;
        self
    }

    /// Sets the PNG compression level, clamped to 0..=9
    pub fn png_compress_level(mut self, level: u8) -> Self {
        self.config.png_compress_level = level.min(9);
        self
    }

    /// Enables or disables the execution log
    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.config.log_enabled = enabled;
        self
    }

    /// Sets the log string truncation threshold
    pub fn log_max_string(mut self, max: usize) -> Self {
        self.config.log_max_string = max;
        self
    }

    /// Sets the per-request timeout
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    /// Selects the provider backend
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Finishes the builder
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

fn parse_backend(name: &str, value: &str) -> Result<BackendKind, ConfigError> {
    value.parse().map_err(|_: String| ConfigError::UnknownBackend {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_int(name: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::NotAnInteger {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn int_setting<F>(lookup: &F, name: &str, default: i64, min: i64, max: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match parse_int(name, &raw) {
        Ok(value) => value.clamp(min, max),
        Err(e) => {
            warn!("Ignoring {}, using {}", e, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.max_screenshot_edge, 1920);
        assert_eq!(config.png_compress_level, 6);
        assert!(config.log_enabled);
        assert_eq!(config.log_max_string, 300);
        assert_eq!(config.tool_timeout, Duration::from_secs(600));
        assert_eq!(config.backend, BackendKind::System);
    }

    #[test]
    fn test_values_are_read() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_MAX_SCREENSHOT_EDGE, "1280"),
            (ENV_PNG_COMPRESS_LEVEL, "1"),
            (ENV_LOG_TO_STDERR, "false"),
            (ENV_LOG_MAX_STRING, "64"),
            (ENV_TOOL_TIMEOUT_SECS, "30"),
            (ENV_BACKEND, "Mock"),
        ]));
        assert_eq!(config.max_screenshot_edge, 1280);
        assert_eq!(config.png_compress_level, 1);
        assert!(!config.log_enabled);
        assert_eq!(config.log_max_string, 64);
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.backend, BackendKind::Mock);
    }

    #[test]
    fn test_values_are_clamped() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_MAX_SCREENSHOT_EDGE, "-5"),
            (ENV_PNG_COMPRESS_LEVEL, "42"),
            (ENV_LOG_MAX_STRING, "1"),
            (ENV_TOOL_TIMEOUT_SECS, "999999"),
        ]));
        assert_eq!(config.max_screenshot_edge, 0);
        assert_eq!(config.png_compress_level, 9);
        assert_eq!(config.log_max_string, 32);
        assert_eq!(config.tool_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (ENV_MAX_SCREENSHOT_EDGE, "big"),
            (ENV_BACKEND, "wayland"),
        ]));
        assert_eq!(config.max_screenshot_edge, 1920);
        assert_eq!(config.backend, BackendKind::System);
    }

    #[test]
    fn test_log_toggle_values() {
        for value in ["0", "false", "NO", " False "] {
            let config = ServerConfig::from_lookup(lookup_from(&[(ENV_LOG_TO_STDERR, value)]));
            assert!(!config.log_enabled, "{value:?} should disable logging");
        }
        for value in ["1", "true", "yes", ""] {
            let config = ServerConfig::from_lookup(lookup_from(&[(ENV_LOG_TO_STDERR, value)]));
            assert!(config.log_enabled, "{value:?} should keep logging on");
        }
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        temp_env::with_vars(
            [
                (ENV_MAX_SCREENSHOT_EDGE, Some("800")),
                (ENV_LOG_TO_STDERR, Some("0")),
                (ENV_BACKEND, None),
            ],
            || {
                let config = ServerConfig::from_env();
                assert_eq!(config.max_screenshot_edge, 800);
                assert!(!config.log_enabled);
                assert_eq!(config.backend, BackendKind::System);
            },
        );
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .max_screenshot_edge(0)
            .png_compress_level(12)
            .log_enabled(false)
            .tool_timeout(Duration::from_millis(50))
            .backend(BackendKind::Mock)
            .build();
        assert_eq!(config.max_screenshot_edge, 0);
        assert_eq!(config.png_compress_level, 9);
        assert!(!config.log_enabled);
        assert_eq!(config.tool_timeout, Duration::from_millis(50));
        assert_eq!(config.backend, BackendKind::Mock);
    }

    #[test]
    fn test_config_errors() {
        let err = parse_int(ENV_LOG_MAX_STRING, "lots").unwrap_err();
        assert_eq!(err.to_string(), r#"CU_MCP_LOG_MAX_STRING="lots" is not an integer"#);

        let err = parse_backend(ENV_BACKEND, "wayland").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend { .. }));
    }

    #[test]
    fn test_backend_parse_and_display() {
        assert_eq!("system".parse::<BackendKind>().unwrap(), BackendKind::System);
        assert!("x11".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Mock.to_string(), "mock");
    }
}
