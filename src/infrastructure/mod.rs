//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (registry, probing).
pub mod image;

pub use config::{AppConfig, CacheConfig, CliArgs, ConfigError, LogLevel, ProbeConfig, StorageManager};
pub use self::image::{HttpImageProbe, ImageRegistry, RegistryStats};
