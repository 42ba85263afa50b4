use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::models::{AppState, CreateRunRequest, ErrorResponse};
use crate::supervisor::RunResult;
use crate::types::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/runs", post(create_run))
        .route("/api/runs/defaults", get(run_defaults))
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Configuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Runs the supervisor to completion. Aborted runs still answer 200 with
/// `stop_reason = "error"`; only invalid input is rejected.
async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<CreateRunRequest>,
) -> Result<ResponseJson<RunResult>, AppError> {
    let config = request.config.unwrap_or_else(|| state.config.run.clone());
    info!(topic = %request.topic, max_iterations = config.max_iterations, "Received run request");

    let result = state.supervisor.run(&request.topic, &config).await.map_err(|e| {
        warn!(error = %e, "Run request rejected");
        e
    })?;

    Ok(Json(result))
}

async fn run_defaults(State(state): State<AppState>) -> ResponseJson<RunConfig> {
    Json(state.config.run.clone())
}
