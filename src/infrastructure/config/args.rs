use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "vitrine",
    version,
    about = "Validate and cache storefront product images",
    long_about = None
)]
pub struct CliArgs {
    /// Catalog JSON file: an array of products `{id, images}` or a bare
    /// array of image descriptors.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", env = "VITRINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Base URL for relative image paths.
    #[arg(long, value_name = "URL", env = "VITRINE_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request probe timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum probes running at once.
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Seconds to wait on an in-flight probe before giving up.
    #[arg(long, value_name = "SECS")]
    pub wait_timeout_secs: Option<u64>,

    /// Only sniff the image header instead of decoding the whole payload.
    #[arg(long)]
    pub no_decode: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}
