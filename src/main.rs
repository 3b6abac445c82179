//! OpenSASE Back-office - catalog variants and purchase-order receiving

use anyhow::Result;
use opensase_backoffice::{http, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    match &config.backend_api_url {
        Some(url) => tracing::info!(backend = %url, "forwarding to REST backend"),
        None => tracing::warn!("BACKEND_API_URL not set, payloads are validated and returned only"),
    }
    let addr = config.bind_addr();
    let app = http::router(http::AppState::new(config)?);

    tracing::info!("🚀 OpenSASE Back-office listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
