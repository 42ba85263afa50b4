// Hypothesis Lab - supervisor-driven refinement of research hypotheses

pub mod agents;
pub mod config;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod report;
pub mod routes;
pub mod search; // Evidence providers (SerpAPI, Google CSE, NASA, arXiv)
pub mod supervisor;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, RunConfig};
pub use models::AppState;
pub use supervisor::{RunResult, Supervisor};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
