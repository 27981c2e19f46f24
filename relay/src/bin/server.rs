use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pulse_core::{Relay, RelayConfig};
use pulse_relay::router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = RelayConfig::from_env();

    // A corrupt journal aborts startup with a diagnostic; a missing one is a
    // clean first start.
    let relay = Arc::new(Relay::open(config.clone())?);
    if let Some(path) = &config.journal_path {
        tracing::info!(journal = %path.display(), "journaling enabled");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Pulse relay listening");

    axum::serve(listener, router(relay)).await?;
    Ok(())
}
