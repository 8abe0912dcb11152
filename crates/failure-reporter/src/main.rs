use anyhow::Result;
use clap::Parser;
use failure_reporter::config::{Args, ReporterConfig};
use failure_reporter::{describe_error, error_exit_code, exit_code, EXIT_CONFIG};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ReporterConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", describe_error(&e));
            std::process::exit(EXIT_CONFIG);
        }
    };

    let summary = match failure_reporter::run(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", describe_error(&e));
            std::process::exit(error_exit_code(&e));
        }
    };
    if !summary.messages.is_empty() {
        println!("{}", summary.render());
    }
    std::process::exit(exit_code(&summary));
}
