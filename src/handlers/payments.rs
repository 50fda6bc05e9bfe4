use crate::{
    services::refunds::{RefundPaymentRequest, RefundResult},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/refund",
    summary = "Refund part or all of a payment",
    description = "A payment that becomes fully refunded also reverses the order's loyalty points",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body = RefundPaymentRequest,
    responses(
        (status = 200, description = "Refund recorded", body = ApiResponse<RefundResult>),
        (status = 400, description = "Amount out of range", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway refused", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundPaymentRequest>,
) -> ApiResult<RefundResult> {
    let result = state
        .services
        .refunds
        .refund_payment(id, payload.amount)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
