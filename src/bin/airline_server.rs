//! Airline customer-service desk over HTTP.
//!
//! Reads `AIRLINE_CONFIG` (a TOML file) when set, otherwise `AIRLINE_*`
//! environment variables on top of the defaults. `OPENAI_API_KEY` must be set.

use std::sync::Arc;

use airline_agents::{server::create_router, AirlineDesk, DeskConfig, OpenAIProvider};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airline_agents=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("AIRLINE_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            DeskConfig::from_file(&path)?
        }
        Err(_) => DeskConfig::from_env(),
    };
    let bind_address = config.bind_address.clone();
    let session_ttl = config.session_ttl;

    let desk = Arc::new(AirlineDesk::from_config(
        config,
        Arc::new(OpenAIProvider::new()),
    )?);

    let purger = desk.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(session_ttl.max(std::time::Duration::from_secs(1)));
        loop {
            interval.tick().await;
            match purger.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "Dropped idle conversations"),
                Err(e) => warn!(error = %e, "Session purge failed"),
            }
        }
    });

    let app = create_router(desk);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Airline desk listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
