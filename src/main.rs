use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use envelope_api::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %settings.data_dir.display(),
        "Starting EnvelopeAPI"
    );

    envelope_api::server::start(settings).await?;

    tracing::info!("Server stopped");
    Ok(())
}
