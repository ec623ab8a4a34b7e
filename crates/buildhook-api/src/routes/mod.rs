//! API routes.

pub mod builds;
pub mod health;

use axum::Router;

use crate::AppState;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(builds::router())
        .merge(health::router())
        .with_state(state)
}
