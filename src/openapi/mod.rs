use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mall Fulfillment Admin API",
        version = "0.1.0",
        description = r#"
Back-office API for order fulfillment of the gym mall.

- **Orders**: create, inspect, memo and soft-delete orders
- **Order Lines**: split, merge, advance status and record courier tracking
- **Requests**: return, exchange and cancel requests with their two shipping legs
- **Payments**: partial and full refunds with loyalty point reversal
- **Reconciliation**: trigger a delivery reconciliation pass on demand

Errors share one body:

```json
{
  "error": "Conflict",
  "message": "order line ... already has an active EXCHANGE request",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
"#
    ),
    tags(
        (name = "Orders", description = "Order header operations"),
        (name = "Order Lines", description = "Split, merge, status and tracking of order lines"),
        (name = "Requests", description = "Return, exchange and cancel requests"),
        (name = "Payments", description = "Refunds"),
        (name = "Reconciliation", description = "Courier delivery reconciliation"),
        (name = "Health", description = "Liveness"),
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::update_memo,
        crate::handlers::orders::acknowledge_memo,
        crate::handlers::order_lines::split_line,
        crate::handlers::order_lines::merge_lines,
        crate::handlers::order_lines::update_status,
        crate::handlers::order_lines::record_tracking,
        crate::handlers::order_lines::delete_line,
        crate::handlers::order_lines::create_request,
        crate::handlers::requests::get_request,
        crate::handlers::requests::update_request,
        crate::handlers::requests::set_approval,
        crate::handlers::requests::record_tracking,
        crate::handlers::requests::delete_request,
        crate::handlers::payments::refund_payment,
        crate::handlers::reconciliation::run_now,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::models::OrderLineStatus,
            crate::models::RequestKind,
            crate::models::RequesterType,
            crate::models::PaymentType,
            crate::commands::returns::ShippingLeg,
        )
    )
)]
pub struct ApiDocV1;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_admin_route() {
        let doc = ApiDocV1::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/v1/orders",
            "/api/v1/orders/{id}",
            "/api/v1/order-lines/{id}/split",
            "/api/v1/order-lines/merge",
            "/api/v1/requests/{id}/approval",
            "/api/v1/payments/{id}/refund",
            "/api/v1/reconciliation/run",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
