pub mod cache;
pub mod config;
pub mod error;
pub mod request_meta;
pub mod security;
pub mod state;
pub mod vault;
pub mod vault_catalog;
pub mod vault_decode;
pub mod worktree;
pub mod worktree_git;

#[cfg(test)]
mod testing;

use axum::{Json, Router, middleware, routing::get};
use pilot_process::CommandRunner;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The console's HTTP surface over `state`.
pub fn app<R: CommandRunner>(state: AppState<R>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(vault::routes())
        .merge(worktree::routes())
        .layer(middleware::from_fn(security::request_id))
        .with_state(state)
}
