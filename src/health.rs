use std::sync::Arc;

use axum::{Json, Router, debug_handler, extract::State, routing::get};
use serde::Serialize;

use crate::{AppState, chat::{Hub, Stats}};

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    #[serde(flatten)]
    stats: Stats,
}

#[debug_handler(state = AppState)]
pub async fn health(State(hub): State<Arc<Hub>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        stats: hub.stats(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
}
