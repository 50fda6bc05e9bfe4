use crate::{
    commands::returns::{RecordRequestTrackingCommand, UpdateRequestCommand},
    entities::return_request,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ApprovalRequest {
    pub approved: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    summary = "Get request",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request found", body = ApiResponse<return_request::Model>),
        (status = 404, description = "Request not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Requests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<return_request::Model> {
    let request = state.services.returns.get_request(id).await?;
    Ok(Json(ApiResponse::success(request)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/requests/{id}",
    summary = "Partially update request",
    description = "Fields omitted from the body keep their stored value",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = UpdateRequestCommand,
    responses((status = 200, description = "Request updated", body = ApiResponse<return_request::Model>)),
    tag = "Requests"
)]
pub async fn update_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateRequestCommand>,
) -> ApiResult<return_request::Model> {
    payload.request_id = id;
    let updated = state.services.returns.update_request(payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    put,
    path = "/api/v1/requests/{id}/approval",
    summary = "Approve or reject request",
    description = "Flips the approval flag only; the order line status is left alone",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = ApprovalRequest,
    responses(
        (status = 200, description = "Approval recorded", body = ApiResponse<return_request::Model>),
        (status = 409, description = "Line still awaiting payment", body = crate::errors::ErrorResponse),
    ),
    tag = "Requests"
)]
pub async fn set_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApprovalRequest>,
) -> ApiResult<return_request::Model> {
    let updated = state
        .services
        .returns
        .approve_request(id, payload.approved)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    put,
    path = "/api/v1/requests/{id}/tracking",
    summary = "Record tracking for one leg of a request",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = RecordRequestTrackingCommand,
    responses((status = 200, description = "Tracking recorded", body = ApiResponse<return_request::Model>)),
    tag = "Requests"
)]
pub async fn record_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<RecordRequestTrackingCommand>,
) -> ApiResult<return_request::Model> {
    payload.request_id = id;
    let updated = state.services.returns.record_tracking(payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}",
    summary = "Soft-delete request",
    params(("id" = Uuid, Path, description = "Request id")),
    responses((status = 200, description = "Request deleted")),
    tag = "Requests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.returns.delete_request(id).await?;
    Ok(Json(ApiResponse::with_message(id, "request deleted")))
}
