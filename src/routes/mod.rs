//! API Routes
//!
//! - `/api/health` - Health check and configured evidence providers
//! - `/api/runs` - Execute a refinement run and return its `RunResult`
//! - `/api/runs/defaults` - Server-side default run configuration

pub mod health;
pub mod runs;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let allowed_origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(health::router(state.clone()))
        .merge(runs::router(state));

    apply_cors(api_router, &allowed_origins).layer(TraceLayer::new_for_http())
}
