pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod middleware;

use std::sync::Arc;

use axum::{Router, extract::FromRef, http::HeaderValue, middleware::from_fn_with_state};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub use config::Config;
pub use error::{ChatError, ChatResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: db::Store,
    pub hub: Arc<chat::Hub>,
    pub api_limiter: Arc<middleware::ApiLimiter>,
}

pub fn app(state: AppState, client_origin: Option<&str>) -> anyhow::Result<Router> {
    let cors = match client_origin {
        Some(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?)),
        None => CorsLayer::new().allow_origin(Any),
    };

    let api = health::router().layer(from_fn_with_state(state.api_limiter.clone(), middleware::limit_api));

    let router = Router::new()
        .merge(chat::router())
        .nest("/api", api)
        .with_state(state)
        .layer(cors);
    Ok(middleware::security_headers(router))
}
