#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use mall_fulfillment::{
    commands::{
        orders::{
            CreateOrderCommand, CreateOrderResult, NewOrderLine, NewPayment, NewShippingAddress,
            RecordTrackingCommand, UpdateOrderLineStatusCommand,
            UpdateOrderLineStatusResult,
        },
        returns::{CreateRequestCommand, RecordRequestTrackingCommand, ShippingLeg},
    },
    config::AppConfig,
    db::{self, DbPool},
    entities::{member_post, order_line, payment, post, return_request, shipping_address},
    errors::ServiceError,
    events::{self, EventSender},
    models::{OrderLineStatus, PaymentType, RequestKind, RequesterType},
    repositories::order_repository,
    services::{
        refunds::RefundGateway,
        tracking::{TrackProgress, TrackStatus, TrackingKey, TrackingProvider, TrackingResponse},
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const CJ: &str = "kr.cjlogistics";
pub const EPOST: &str = "kr.epost";

/// What the fake provider answers for one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    /// `state.id = delivered`, empty history
    Delivered,
    /// Top-level state lags; only the history says delivered
    DeliveredInHistory,
    InTransit,
    Fail,
    /// Never answers within the reconciler's timeout
    Hang,
    /// Delivered, but only after a short delay
    SlowDelivered,
}

/// Tracking provider that answers from a script and records every call.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<HashMap<TrackingKey, Scripted>>,
    calls: Mutex<Vec<TrackingKey>>,
}

impl ScriptedProvider {
    pub fn set(&self, courier: &str, tracking: &str, answer: Scripted) {
        self.script
            .lock()
            .unwrap()
            .insert(TrackingKey::new(courier, tracking), answer);
    }

    pub fn calls(&self) -> Vec<TrackingKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

fn status(id: &str) -> Option<TrackStatus> {
    Some(TrackStatus {
        id: Some(id.to_string()),
        text: None,
    })
}

#[async_trait]
impl TrackingProvider for ScriptedProvider {
    async fn track(&self, key: &TrackingKey) -> Result<TrackingResponse, ServiceError> {
        self.calls.lock().unwrap().push(key.clone());
        let answer = self
            .script
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(Scripted::InTransit);

        match answer {
            Scripted::Delivered => Ok(TrackingResponse {
                state: status("delivered"),
                progresses: Vec::new(),
            }),
            Scripted::DeliveredInHistory => Ok(TrackingResponse {
                state: status("out_for_delivery"),
                progresses: vec![
                    TrackProgress {
                        status: status("in_transit"),
                        ..Default::default()
                    },
                    TrackProgress {
                        status: status("delivered"),
                        ..Default::default()
                    },
                ],
            }),
            Scripted::InTransit => Ok(TrackingResponse {
                state: status("in_transit"),
                progresses: vec![TrackProgress {
                    status: status("at_pickup"),
                    ..Default::default()
                }],
            }),
            Scripted::Fail => Err(ServiceError::UpstreamError(format!(
                "tracking {}: provider returned 500",
                key
            ))),
            Scripted::SlowDelivered => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(TrackingResponse {
                    state: status("delivered"),
                    progresses: Vec::new(),
                })
            }
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(TrackingResponse::default())
            }
        }
    }
}

/// Refund gateway that records calls and can be told to refuse.
#[derive(Default)]
pub struct RecordingGateway {
    refuse: AtomicBool,
    calls: Mutex<Vec<(Uuid, Decimal)>>,
}

impl RecordingGateway {
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(Uuid, Decimal)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RefundGateway for RecordingGateway {
    async fn refund(&self, payment: &payment::Model, amount: Decimal) -> Result<(), ServiceError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ServiceError::UpstreamError("card issuer declined".into()));
        }
        self.calls.lock().unwrap().push((payment.id, amount));
        Ok(())
    }
}

/// Application state over a fresh SQLite file with all migrations applied.
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    pub gateway: Arc<RecordingGateway>,
    router: Router,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("fulfillment.sqlite").display()
        );

        let mut cfg = AppConfig::new(url, "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.reconciliation.enabled = false;
        cfg.reconciliation.call_timeout_secs = 1;
        cfg.reconciliation.max_concurrency = 4;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let provider = Arc::new(ScriptedProvider::default());
        let gateway = Arc::new(RecordingGateway::default());

        let state = AppState::new(
            cfg,
            Arc::new(pool),
            event_sender,
            provider.clone(),
            gateway.clone(),
        );
        let router = mall_fulfillment::api_router(state.clone());

        Self {
            state,
            provider,
            gateway,
            router,
            _dir: dir,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DbPool {
        self.state.db.as_ref()
    }

    pub fn address(receiver: &str) -> NewShippingAddress {
        NewShippingAddress {
            receiver_name: receiver.to_string(),
            receiver_phone: "010-1234-5678".to_string(),
            address: format!("{receiver} street 1"),
            address_detail: Some("Gym front desk".to_string()),
            zip_code: "06236".to_string(),
            entry_instructions: None,
        }
    }

    /// Paid order with one line per `(product, quantity)`.
    pub async fn create_order(
        &self,
        member_id: Uuid,
        lines: &[(&str, i32)],
        address: Option<NewShippingAddress>,
    ) -> CreateOrderResult {
        self.create_order_with(member_id, lines, address, true).await
    }

    /// Order whose lines still await payment.
    pub async fn create_unpaid_order(
        &self,
        member_id: Uuid,
        lines: &[(&str, i32)],
    ) -> CreateOrderResult {
        self.create_order_with(member_id, lines, None, false).await
    }

    async fn create_order_with(
        &self,
        member_id: Uuid,
        lines: &[(&str, i32)],
        address: Option<NewShippingAddress>,
        paid: bool,
    ) -> CreateOrderResult {
        self.state
            .services
            .orders
            .create_order(CreateOrderCommand {
                member_id,
                lines: lines
                    .iter()
                    .map(|(name, quantity)| NewOrderLine {
                        product_variant_id: Uuid::new_v4(),
                        product_name: name.to_string(),
                        quantity: *quantity,
                    })
                    .collect(),
                address,
                memo: None,
                paid,
                payments: vec![NewPayment {
                    payment_type: PaymentType::Product,
                    paid_amount: Decimal::new(50_000, 0),
                    provider_payment_key: Some(format!("pay_{}", Uuid::new_v4().simple())),
                    provider_order_id: None,
                }],
            })
            .await
            .expect("order created")
    }

    pub async fn line(&self, id: Uuid) -> order_line::Model {
        order_line::Entity::find_by_id(id)
            .one(self.db())
            .await
            .unwrap()
            .expect("order line exists")
    }

    pub async fn active_address(&self, line_id: Uuid) -> Option<shipping_address::Model> {
        order_repository::find_active_address(self.db(), line_id)
            .await
            .unwrap()
    }

    pub async fn payment(&self, id: Uuid) -> payment::Model {
        payment::Entity::find_by_id(id)
            .one(self.db())
            .await
            .unwrap()
            .expect("payment exists")
    }

    pub async fn set_status(&self, line_id: Uuid, status: OrderLineStatus) {
        self.move_line(line_id, status)
            .await
            .unwrap_or_else(|e| panic!("moving {line_id} to {status}: {e}"));
    }

    /// Admin status change without a reason.
    pub async fn move_line(
        &self,
        line_id: Uuid,
        status: OrderLineStatus,
    ) -> Result<UpdateOrderLineStatusResult, ServiceError> {
        self.state
            .services
            .orders
            .update_line_status(UpdateOrderLineStatusCommand {
                order_line_id: line_id,
                status,
                reason_code: None,
                reason_text: None,
            })
            .await
    }

    /// Requests on the line that are neither withdrawn nor deleted.
    pub async fn active_requests(&self, line_id: Uuid) -> Vec<return_request::Model> {
        return_request::Entity::find()
            .filter(return_request::Column::OrderLineId.eq(line_id))
            .filter(return_request::Column::Canceled.eq(false))
            .filter(return_request::Column::Deleted.eq(false))
            .all(self.db())
            .await
            .unwrap()
    }

    /// Records tracking on the line and moves it to `IN_TRANSIT`.
    pub async fn ship(&self, line_id: Uuid, courier: &str, tracking: &str) {
        self.state
            .services
            .orders
            .record_tracking(RecordTrackingCommand {
                order_line_id: line_id,
                courier_code: courier.to_string(),
                tracking_number: tracking.to_string(),
                shipment_id: None,
            })
            .await
            .expect("tracking recorded");
        self.set_status(line_id, OrderLineStatus::InTransit).await;
    }

    /// Member-opened request for the whole line.
    pub async fn open_request(
        &self,
        line_id: Uuid,
        kind: RequestKind,
    ) -> Result<return_request::Model, ServiceError> {
        self.state
            .services
            .returns
            .create_request(CreateRequestCommand {
                order_line_id: line_id,
                kind,
                requester_type: RequesterType::Member,
                requester_id: None,
                reason_code: "CHANGED_MIND".to_string(),
                reason_text: Some("Wrong size".to_string()),
                quantity: None,
                receiver_name: None,
                receiver_phone: None,
                address: None,
                address_detail: None,
                zip_code: None,
            })
            .await
            .map(|created| created.request)
    }

    pub async fn track_request(
        &self,
        request_id: Uuid,
        leg: ShippingLeg,
        courier: &str,
        tracking: &str,
    ) -> Result<return_request::Model, ServiceError> {
        self.state
            .services
            .returns
            .record_tracking(RecordRequestTrackingCommand {
                request_id,
                leg,
                courier_code: courier.to_string(),
                tracking_number: tracking.to_string(),
                shipment_id: None,
            })
            .await
    }

    /// Delivery posts in a member's inbox.
    pub async fn inbox(&self, member_id: Uuid) -> Vec<post::Model> {
        let deliveries = member_post::Entity::find()
            .filter(member_post::Column::MemberId.eq(member_id))
            .find_also_related(post::Entity)
            .all(self.db())
            .await
            .unwrap();
        deliveries.into_iter().filter_map(|(_, post)| post).collect()
    }

    /// Replaces the active address snapshot of a line.
    pub async fn readdress(&self, line_id: Uuid, receiver: Option<&str>) {
        if let Some(current) = self.active_address(line_id).await {
            let mut model: shipping_address::ActiveModel = current.into();
            model.active = Set(false);
            model.update(self.db()).await.unwrap();
        }
        if let Some(receiver) = receiver {
            let address = Self::address(receiver);
            shipping_address::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_line_id: Set(line_id),
                receiver_name: Set(address.receiver_name),
                receiver_phone: Set(address.receiver_phone),
                address: Set(address.address),
                address_detail: Set(address.address_detail),
                zip_code: Set(address.zip_code),
                entry_instructions: Set(None),
                active: Set(true),
                created_at: Set(Utc::now()),
            }
            .insert(self.db())
            .await
            .unwrap();
        }
    }

    /// Sends a request through the full router and decodes the JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router responded");

        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
