use crate::{
    commands::orders::{
        MergeOrderLinesCommand, MergeOrderLinesResult, RecordTrackingCommand,
        SplitOrderLineCommand, SplitOrderLineResult, UpdateOrderLineStatusCommand,
        UpdateOrderLineStatusResult,
    },
    commands::returns::{CreateRequestCommand, CreateRequestResult},
    entities::order_line,
    errors::ServiceError,
    models::OrderLineStatus,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SplitLineRequest {
    /// Units carved off into a new shipping group
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateLineStatusRequest {
    pub status: OrderLineStatus,
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RecordTrackingRequest {
    pub courier_code: String,
    pub tracking_number: String,
    pub shipment_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/order-lines/{id}/split",
    summary = "Split order line",
    params(("id" = Uuid, Path, description = "Order line id")),
    request_body = SplitLineRequest,
    responses(
        (status = 200, description = "Line split", body = ApiResponse<SplitOrderLineResult>),
        (status = 400, description = "Quantity out of range", body = crate::errors::ErrorResponse),
        (status = 409, description = "Line cannot be split in its current state", body = crate::errors::ErrorResponse),
    ),
    tag = "Order Lines"
)]
pub async fn split_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SplitLineRequest>,
) -> ApiResult<SplitOrderLineResult> {
    let result = state
        .services
        .orders
        .split_line(SplitOrderLineCommand {
            order_line_id: id,
            quantity: payload.quantity,
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/order-lines/merge",
    summary = "Merge two split lines",
    request_body = MergeOrderLinesCommand,
    responses(
        (status = 200, description = "Lines merged", body = ApiResponse<MergeOrderLinesResult>),
        (status = 409, description = "Lines cannot be merged", body = crate::errors::ErrorResponse),
    ),
    tag = "Order Lines"
)]
pub async fn merge_lines(
    State(state): State<AppState>,
    Json(payload): Json<MergeOrderLinesCommand>,
) -> ApiResult<MergeOrderLinesResult> {
    let result = state.services.orders.merge_lines(payload).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    put,
    path = "/api/v1/order-lines/{id}/status",
    summary = "Advance order line status",
    params(("id" = Uuid, Path, description = "Order line id")),
    request_body = UpdateLineStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<UpdateOrderLineStatusResult>),
        (status = 409, description = "Transition not allowed or duplicate request", body = crate::errors::ErrorResponse),
    ),
    tag = "Order Lines"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLineStatusRequest>,
) -> ApiResult<UpdateOrderLineStatusResult> {
    let result = state
        .services
        .orders
        .update_line_status(UpdateOrderLineStatusCommand {
            order_line_id: id,
            status: payload.status,
            reason_code: payload.reason_code,
            reason_text: payload.reason_text,
        })
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    put,
    path = "/api/v1/order-lines/{id}/tracking",
    summary = "Record courier tracking",
    params(("id" = Uuid, Path, description = "Order line id")),
    request_body = RecordTrackingRequest,
    responses((status = 200, description = "Tracking recorded", body = ApiResponse<order_line::Model>)),
    tag = "Order Lines"
)]
pub async fn record_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordTrackingRequest>,
) -> ApiResult<order_line::Model> {
    let line = state
        .services
        .orders
        .record_tracking(RecordTrackingCommand {
            order_line_id: id,
            courier_code: payload.courier_code,
            tracking_number: payload.tracking_number,
            shipment_id: payload.shipment_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(line)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/order-lines/{id}",
    summary = "Soft-delete order line",
    params(("id" = Uuid, Path, description = "Order line id")),
    responses((status = 200, description = "Line deleted")),
    tag = "Order Lines"
)]
pub async fn delete_line(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Uuid> {
    state.services.orders.delete_line(id).await?;
    Ok(Json(ApiResponse::with_message(id, "order line deleted")))
}

#[utoipa::path(
    post,
    path = "/api/v1/order-lines/{id}/requests",
    summary = "Open return, exchange or cancel request",
    params(("id" = Uuid, Path, description = "Order line id")),
    request_body = CreateRequestCommand,
    responses(
        (status = 201, description = "Request opened", body = ApiResponse<CreateRequestResult>),
        (status = 409, description = "An active request of this kind exists", body = crate::errors::ErrorResponse),
    ),
    tag = "Requests"
)]
pub async fn create_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<CreateRequestCommand>,
) -> Result<(StatusCode, Json<ApiResponse<CreateRequestResult>>), ServiceError> {
    payload.order_line_id = id;
    let created = state.services.returns.create_request(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}
