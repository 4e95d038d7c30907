//! browsers-configurator - main entry point.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use browsers_configurator::cli::{Cli, run_generate};
use browsers_configurator::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = cli.apply(Config::from_env()?)?;

    // Logs go to stderr so stdout stays a clean JSON document.
    let default_filter = if config.verbose {
        "browsers_configurator=info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    tracing::debug!(
        "Configuring {} browser(s), limit {}, pull {}",
        config.browsers.len(),
        config.limit,
        config.pull
    );

    run_generate(&config, cli.output.as_deref()).await
}
