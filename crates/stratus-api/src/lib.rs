//! stratus-api: REST API for Stratus.
//!
//! Accepts vector-form optimization requests and answers with a placement
//! report. Each request gets its own model and search; the search runs on
//! the blocking pool so the async workers stay responsive.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/placements` | Optimize a placement request |
//! | GET | `/healthz` | Liveness probe |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};

/// Shared state for API handlers.
#[derive(Debug, Clone, Default)]
pub struct ApiState {
    /// Search workers for requests that don't name their own.
    pub default_workers: Option<usize>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/placements", post(handlers::create_placement))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
