//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "vitrine";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "vitrine";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from TOML and overridden by CLI flags.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Image probe configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Registry configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Image probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum probes running at once.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Base URL used to resolve relative image paths.
    #[serde(default)]
    pub base_url: Option<String>,

    /// User agent sent with probe requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fully decode the payload instead of sniffing its header.
    #[serde(default = "default_true")]
    pub verify_decode: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_probes: default_max_concurrent_probes(),
            base_url: None,
            user_agent: default_user_agent(),
            verify_decode: true,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a caller waits on an in-flight probe before giving up.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl CacheConfig {
    /// Returns the wait timeout as a duration.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_concurrent_probes() -> usize {
    6
}

const fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_true() -> bool {
    true
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = &args.base_url {
            self.probe.base_url = Some(base_url.clone());
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.probe.timeout_secs = timeout_secs;
        }
        if let Some(max_concurrent) = args.max_concurrent {
            self.probe.max_concurrent_probes = max_concurrent;
        }
        if args.no_decode {
            self.probe.verify_decode = false;
        }
        if let Some(wait_timeout_secs) = args.wait_timeout_secs {
            self.cache.wait_timeout_secs = wait_timeout_secs;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            probe: ProbeConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [probe]
            base_url = "https://shop.example.com/"
            max_concurrent_probes = 2

            [cache]
            wait_timeout_secs = 5
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.probe.base_url.as_deref(),
            Some("https://shop.example.com/")
        );
        assert_eq!(config.probe.max_concurrent_probes, 2);
        assert_eq!(config.probe.timeout_secs, 10);
        assert!(config.probe.verify_decode);
        assert_eq!(config.cache.wait_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.probe.base_url.is_none());
        assert_eq!(config.probe.max_concurrent_probes, 6);
        assert!(config.probe.user_agent.starts_with("vitrine/"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::default();
        let args = CliArgs::parse_from([
            "vitrine",
            "--log-level",
            "warn",
            "--base-url",
            "http://localhost:8080/",
            "--timeout-secs",
            "3",
            "--no-decode",
            "catalog.json",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(
            config.probe.base_url.as_deref(),
            Some("http://localhost:8080/")
        );
        assert_eq!(config.probe.timeout_secs, 3);
        assert!(!config.probe.verify_decode);
        assert_eq!(config.probe.max_concurrent_probes, 6);
    }
}
