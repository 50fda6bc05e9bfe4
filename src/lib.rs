//! Order fulfillment and delivery reconciliation for the gym-mall back office.
//!
//! Admin mutations (split, merge, status, tracking, return/exchange
//! requests, refunds) run as [`commands::Command`]s inside one database
//! transaction each. [`services::reconciliation::DeliveryReconciler`] polls
//! the courier-tracking provider on a timer and notifies members once their
//! shipment lands.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    events::EventSender,
    handlers::AppServices,
    services::{
        notifications::NotificationEmitter,
        reconciliation::DeliveryReconciler,
        refunds::{RefundGateway, RefundService},
        tracking::TrackingProvider,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    /// Wires every service over one pool and event channel.
    pub fn new(
        config: config::AppConfig,
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn TrackingProvider>,
        gateway: Arc<dyn RefundGateway>,
    ) -> Self {
        let emitter = NotificationEmitter::from_config(db.clone(), &config.reconciliation);
        let reconciler = Arc::new(DeliveryReconciler::new(
            db.clone(),
            provider,
            emitter,
            event_sender.clone(),
            &config.reconciliation,
        ));
        let refunds = RefundService::new(db.clone(), gateway, event_sender.clone());
        let services = AppServices::new(db.clone(), event_sender.clone(), refunds, reconciler);

        Self {
            db,
            config,
            event_sender,
            services,
        }
    }

    pub fn reconciler(&self) -> Arc<DeliveryReconciler> {
        self.services.reconciler.clone()
    }
}

// Common response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).delete(handlers::orders::delete_order),
        )
        .route("/orders/:id/memo", put(handlers::orders::update_memo))
        .route(
            "/orders/:id/memo/ack",
            post(handlers::orders::acknowledge_memo),
        );

    let order_lines = Router::new()
        .route("/order-lines/merge", post(handlers::order_lines::merge_lines))
        .route(
            "/order-lines/:id",
            axum::routing::delete(handlers::order_lines::delete_line),
        )
        .route(
            "/order-lines/:id/split",
            post(handlers::order_lines::split_line),
        )
        .route(
            "/order-lines/:id/status",
            put(handlers::order_lines::update_status),
        )
        .route(
            "/order-lines/:id/tracking",
            put(handlers::order_lines::record_tracking),
        )
        .route(
            "/order-lines/:id/requests",
            post(handlers::order_lines::create_request),
        );

    let requests = Router::new()
        .route(
            "/requests/:id",
            get(handlers::requests::get_request)
                .patch(handlers::requests::update_request)
                .delete(handlers::requests::delete_request),
        )
        .route(
            "/requests/:id/approval",
            put(handlers::requests::set_approval),
        )
        .route(
            "/requests/:id/tracking",
            put(handlers::requests::record_tracking),
        );

    Router::new()
        .merge(orders)
        .merge(order_lines)
        .merge(requests)
        .route(
            "/payments/:id/refund",
            post(handlers::payments::refund_payment),
        )
        .route(
            "/reconciliation/run",
            post(handlers::reconciliation::run_now),
        )
}

/// Upper bound on one admin request; a manual reconciliation run is the slowest.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Full admin router: health, OpenAPI document and the v1 API.
pub fn api_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes())
        .layer(middleware)
        .with_state(state)
}
