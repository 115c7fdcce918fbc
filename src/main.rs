use std::{net::SocketAddr, sync::Arc, time::Duration};

use strangers::{AppState, Config, app, chat::Hub, db::Store, middleware::ApiLimiter};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::from_env()?;

    let store = Store::connect(&config.database_url).await?;
    let hub = Arc::new(Hub::new(config.rate_limit, config.content));
    let api_limiter = Arc::new(ApiLimiter::new(config.api_limit));

    // expired rate counters of long-lived connections and idle api clients
    let (purge_hub, purge_api) = (hub.clone(), api_limiter.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            purge_hub.purge_rate_limits();
            purge_api.purge();
        }
    });

    let app = app(AppState { store, hub, api_limiter }, config.client_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
