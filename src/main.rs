use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vitrine::application::{ImageValidator, ValidateCatalogUseCase, ValidatorConfig, parse_catalog};
use vitrine::infrastructure::{AppConfig, CliArgs, HttpImageProbe, ImageRegistry, StorageManager};
use vitrine::presentation::{ReportFormat, render};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = vitrine::VERSION, "Starting {}", vitrine::NAME);

    let text = tokio::fs::read_to_string(&args.input)
        .await
        .wrap_err_with(|| format!("Failed to read {}", args.input.display()))?;
    let products = parse_catalog(&text).wrap_err("Catalog is not a valid product list")?;

    let probe = Arc::new(HttpImageProbe::new(&config.probe)?);
    let validator = Arc::new(ImageValidator::new(
        ImageRegistry::shared(),
        probe,
        ValidatorConfig::from(&config),
    ));

    let report = ValidateCatalogUseCase::new(validator)
        .execute(&products)
        .await;

    let format = if args.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    println!("{}", render(&report, format)?);

    Ok(())
}
