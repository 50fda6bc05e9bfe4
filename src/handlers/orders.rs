use crate::{
    commands::orders::{CreateOrderCommand, CreateOrderResult, UpdateOrderMemoCommand},
    entities::order,
    services::orders::OrderDetail,
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
pub struct UpdateMemoRequest {
    pub memo: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    request_body = CreateOrderCommand,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderResult>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderCommand>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOrderResult>>), crate::errors::ServiceError> {
    let created = state.services.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Order header with live lines, their active address and any open request",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Soft-delete order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 409, description = "A line is still in transit", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::with_message(id, "order deleted")))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/memo",
    summary = "Replace order memo",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateMemoRequest,
    responses((status = 200, description = "Memo updated", body = ApiResponse<order::Model>)),
    tag = "Orders"
)]
pub async fn update_memo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMemoRequest>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .update_memo(UpdateOrderMemoCommand {
            order_id: id,
            memo: payload.memo,
        })
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/memo/ack",
    summary = "Acknowledge order memo",
    params(("id" = Uuid, Path, description = "Order id")),
    responses((status = 200, description = "Memo acknowledged", body = ApiResponse<order::Model>)),
    tag = "Orders"
)]
pub async fn acknowledge_memo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let updated = state.services.orders.acknowledge_memo(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}
