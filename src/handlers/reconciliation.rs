use crate::{services::reconciliation::ReconciliationReport, ApiResponse, ApiResult, AppState};
use axum::{extract::State, response::Json};

#[utoipa::path(
    post,
    path = "/api/v1/reconciliation/run",
    summary = "Run delivery reconciliation now",
    description = "Runs one pass outside the schedule and returns its report",
    responses(
        (status = 200, description = "Run finished", body = ApiResponse<ReconciliationReport>),
    ),
    tag = "Reconciliation"
)]
pub async fn run_now(State(state): State<AppState>) -> ApiResult<ReconciliationReport> {
    let report = state.services.reconciler.run_once().await?;
    Ok(Json(ApiResponse::success(report)))
}
