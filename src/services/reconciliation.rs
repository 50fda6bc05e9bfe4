//! Periodic delivery reconciliation against the courier-tracking provider.
//!
//! A run collects every in-transit line whose order is live, asks the
//! provider once per distinct shipment, advances delivered lines with a
//! conditional set-based update and notifies the members whose lines this
//! run actually moved.

use crate::{
    config::ReconciliationConfig,
    db::DbPool,
    entities::{order, order_line, return_request},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderLineStatus, RequestKind},
    services::{
        notifications::NotificationEmitter,
        tracking::{TrackingKey, TrackingProvider},
    },
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// In-transit lines selected for this run
    pub candidates: usize,
    /// Distinct (courier, tracking number) pairs queried
    pub distinct_shipments: usize,
    /// Pairs whose call failed or timed out; retried next run
    pub provider_failures: usize,
    pub delivered_shipments: usize,
    /// Lines this run moved to their delivered status
    pub lines_advanced: usize,
    pub notifications_created: usize,
    pub notifications_failed: usize,
    pub advanced_line_ids: Vec<Uuid>,
}

/// An in-transit line and the shipment it currently rides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub order_line_id: Uuid,
    pub status: OrderLineStatus,
    pub key: TrackingKey,
}

#[derive(Debug)]
enum Lookup {
    Delivered,
    NotDelivered,
    Failed,
}

#[derive(Clone)]
pub struct DeliveryReconciler {
    db_pool: Arc<DbPool>,
    provider: Arc<dyn TrackingProvider>,
    emitter: NotificationEmitter,
    event_sender: Arc<EventSender>,
    call_timeout: Duration,
    max_concurrency: usize,
}

impl DeliveryReconciler {
    pub fn new(
        db_pool: Arc<DbPool>,
        provider: Arc<dyn TrackingProvider>,
        emitter: NotificationEmitter,
        event_sender: Arc<EventSender>,
        config: &ReconciliationConfig,
    ) -> Self {
        Self {
            db_pool,
            provider,
            emitter,
            event_sender,
            call_timeout: config.call_timeout(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Executes one full collect, query, apply and notify pass.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run_once(&self) -> Result<ReconciliationReport, ServiceError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();

        let mut report = ReconciliationReport {
            run_id,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let candidates = self.collect_candidates().await?;
        report.candidates = candidates.len();

        let keys: BTreeSet<TrackingKey> = candidates.iter().map(|c| c.key.clone()).collect();
        report.distinct_shipments = keys.len();
        debug!(
            candidates = report.candidates,
            shipments = report.distinct_shipments,
            "collected in-transit lines"
        );

        let mut delivered = HashSet::new();
        for (key, lookup) in self.query_provider(keys).await {
            match lookup {
                Lookup::Delivered => {
                    delivered.insert(key);
                }
                Lookup::NotDelivered => {}
                Lookup::Failed => report.provider_failures += 1,
            }
        }
        report.delivered_shipments = delivered.len();

        let advanced = self.apply_delivered(run_id, &candidates, &delivered).await?;
        report.lines_advanced = advanced.len();

        for (line, order) in advanced {
            report.advanced_line_ids.push(line.id);
            let Some(order) = order else {
                warn!(order_line_id = %line.id, "advanced line has no order, skipping notice");
                report.notifications_failed += 1;
                continue;
            };
            match self
                .emitter
                .notify_delivered(order.member_id, &line.product_name)
                .await
            {
                Ok(_) => report.notifications_created += 1,
                Err(e) => {
                    error!(order_line_id = %line.id, error = %e, "delivery notice failed");
                    counter!("fulfillment_notification_failures_total", 1);
                    report.notifications_failed += 1;
                }
            }
        }

        report.finished_at = Some(Utc::now());
        histogram!("fulfillment_reconciliation_duration", started.elapsed());
        counter!("fulfillment_reconciliation_runs_total", 1);
        counter!(
            "fulfillment_reconciliation_lines_advanced_total",
            report.lines_advanced as u64
        );
        gauge!("fulfillment_reconciliation_candidates", report.candidates as f64);

        info!(
            candidates = report.candidates,
            shipments = report.distinct_shipments,
            failures = report.provider_failures,
            advanced = report.lines_advanced,
            notified = report.notifications_created,
            "reconciliation run finished"
        );

        if report.lines_advanced > 0 {
            self.event_sender
                .send_or_log(Event::DeliveryReconciled {
                    run_id,
                    lines_advanced: report.lines_advanced,
                })
                .await;
        }

        Ok(report)
    }

    /// Lines in transit on a live order, paired with the shipment to poll.
    pub async fn collect_candidates(&self) -> Result<Vec<Candidate>, ServiceError> {
        let db = self.db_pool.as_ref();

        let lines = order_line::Entity::find()
            .inner_join(order::Entity)
            .filter(order::Column::Deleted.eq(false))
            .filter(order_line::Column::Deleted.eq(false))
            .filter(order_line::Column::Status.is_in([
                OrderLineStatus::InTransit,
                OrderLineStatus::ExchangeInTransit,
            ]))
            .all(db)
            .await?;

        let exchange_line_ids: Vec<Uuid> = lines
            .iter()
            .filter(|line| line.status == OrderLineStatus::ExchangeInTransit)
            .map(|line| line.id)
            .collect();

        let exchanges = if exchange_line_ids.is_empty() {
            Vec::new()
        } else {
            return_request::Entity::find()
                .filter(return_request::Column::OrderLineId.is_in(exchange_line_ids))
                .filter(return_request::Column::Kind.eq(RequestKind::Exchange))
                .filter(return_request::Column::Deleted.eq(false))
                .filter(return_request::Column::Canceled.eq(false))
                .order_by_desc(return_request::Column::CreatedAt)
                .all(db)
                .await?
        };

        Ok(build_candidates(&lines, &exchanges))
    }

    async fn query_provider(&self, keys: BTreeSet<TrackingKey>) -> Vec<(TrackingKey, Lookup)> {
        let call_timeout = self.call_timeout;

        stream::iter(keys)
            .map(|key| {
                let provider = self.provider.clone();
                async move {
                    let lookup = match tokio::time::timeout(call_timeout, provider.track(&key)).await
                    {
                        Ok(Ok(response)) if response.is_delivered() => Lookup::Delivered,
                        Ok(Ok(_)) => Lookup::NotDelivered,
                        Ok(Err(e)) => {
                            warn!(shipment = %key, error = %e, "tracking lookup failed");
                            Lookup::Failed
                        }
                        Err(_) => {
                            warn!(shipment = %key, timeout = ?call_timeout, "tracking lookup timed out");
                            counter!("fulfillment_provider_failures_total", 1, "reason" => "timeout");
                            Lookup::Failed
                        }
                    };
                    (key, lookup)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }

    /// Moves delivered candidates forward, guarded by their current status,
    /// and returns exactly the lines this run transitioned.
    async fn apply_delivered(
        &self,
        run_id: Uuid,
        candidates: &[Candidate],
        delivered: &HashSet<TrackingKey>,
    ) -> Result<Vec<(order_line::Model, Option<order::Model>)>, ServiceError> {
        let mut by_status: HashMap<OrderLineStatus, Vec<Uuid>> = HashMap::new();
        for candidate in candidates.iter().filter(|c| delivered.contains(&c.key)) {
            by_status
                .entry(candidate.status)
                .or_default()
                .push(candidate.order_line_id);
        }
        if by_status.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    for (from, ids) in by_status {
                        let Some(to) = from.delivered_counterpart() else {
                            continue;
                        };
                        let result = order_line::Entity::update_many()
                            .set(order_line::ActiveModel {
                                status: Set(to),
                                delivered_at: Set(Some(now)),
                                last_reconciliation_id: Set(Some(run_id)),
                                updated_at: Set(now),
                                ..Default::default()
                            })
                            .filter(order_line::Column::Id.is_in(ids))
                            .filter(order_line::Column::Status.eq(from))
                            .filter(order_line::Column::Deleted.eq(false))
                            .exec(txn)
                            .await?;
                        debug!(%from, %to, rows = result.rows_affected, "delivered lines advanced");
                    }
                    Ok(())
                })
            })
            .await?;

        Ok(order_line::Entity::find()
            .find_also_related(order::Entity)
            .filter(order_line::Column::LastReconciliationId.eq(run_id))
            .all(self.db_pool.as_ref())
            .await?)
    }

    /// Runs `run_once` every `interval` until the task is aborted. Ticks
    /// that fall behind a slow run are skipped, not queued.
    pub fn spawn_worker(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(?interval, "delivery reconciliation worker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    counter!("fulfillment_reconciliation_errors_total", 1);
                    error!(error = %e, "reconciliation run failed");
                }
            }
        })
    }
}

/// Pairs lines with their shipment. Forward lines use their own tracking;
/// exchange lines use the redelivery leg of their newest active exchange.
/// Lines with nothing to track are left out.
pub fn build_candidates(
    lines: &[order_line::Model],
    exchanges: &[return_request::Model],
) -> Vec<Candidate> {
    let mut newest_exchange: HashMap<Uuid, &return_request::Model> = HashMap::new();
    for request in exchanges.iter().filter(|r| r.is_active()) {
        newest_exchange
            .entry(request.order_line_id)
            .and_modify(|current| {
                if request.created_at > current.created_at {
                    *current = request;
                }
            })
            .or_insert(request);
    }

    lines
        .iter()
        .filter_map(|line| {
            let (courier, tracking) = match line.status {
                OrderLineStatus::InTransit => line.tracking_pair()?,
                OrderLineStatus::ExchangeInTransit => {
                    newest_exchange.get(&line.id)?.redelivery_tracking()?
                }
                _ => return None,
            };
            Some(Candidate {
                order_line_id: line.id,
                status: line.status,
                key: TrackingKey::new(courier, tracking),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequesterType;

    fn line(status: OrderLineStatus, tracking: Option<(&str, &str)>) -> order_line::Model {
        let now = Utc::now();
        order_line::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            lineage_id: Uuid::new_v4(),
            product_variant_id: Uuid::new_v4(),
            product_name: "Kettlebell 16kg".into(),
            paid_quantity: 1,
            quantity: 1,
            status,
            held_from: None,
            order_group: 1,
            courier_code: tracking.map(|(c, _)| c.to_string()),
            tracking_number: tracking.map(|(_, t)| t.to_string()),
            shipment_id: None,
            delivered_at: None,
            last_reconciliation_id: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn exchange(line_id: Uuid, redelivery: Option<(&str, &str)>, canceled: bool) -> return_request::Model {
        let now = Utc::now();
        return_request::Model {
            id: Uuid::new_v4(),
            order_line_id: line_id,
            kind: RequestKind::Exchange,
            requester_type: RequesterType::Admin,
            requester_id: None,
            reason_code: "SIZE".into(),
            reason_text: None,
            quantity: 1,
            approved: Some(true),
            canceled,
            receiver_name: None,
            receiver_phone: None,
            address: None,
            address_detail: None,
            zip_code: None,
            pickup_courier_code: None,
            pickup_tracking_number: None,
            pickup_shipment_id: None,
            redelivery_courier_code: redelivery.map(|(c, _)| c.to_string()),
            redelivery_tracking_number: redelivery.map(|(_, t)| t.to_string()),
            redelivery_shipment_id: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn forward_lines_use_their_own_tracking() {
        let shipped = line(OrderLineStatus::InTransit, Some(("kr.cjlogistics", "111")));
        let untracked = line(OrderLineStatus::InTransit, None);
        let paid = line(OrderLineStatus::Paid, Some(("kr.cjlogistics", "222")));

        let candidates = build_candidates(&[shipped.clone(), untracked, paid], &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].order_line_id, shipped.id);
        assert_eq!(candidates[0].key, TrackingKey::new("kr.cjlogistics", "111"));
    }

    #[test]
    fn exchange_lines_use_redelivery_leg() {
        // The line still carries the original outbound tracking.
        let line = line(OrderLineStatus::ExchangeInTransit, Some(("kr.cjlogistics", "111")));
        let withdrawn = exchange(line.id, Some(("kr.epost", "999")), true);
        let active = exchange(line.id, Some(("kr.epost", "555")), false);

        let candidates = build_candidates(std::slice::from_ref(&line), &[withdrawn, active]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key, TrackingKey::new("kr.epost", "555"));
        assert_eq!(candidates[0].status, OrderLineStatus::ExchangeInTransit);
    }

    #[test]
    fn exchange_without_redelivery_tracking_is_skipped() {
        let line = line(OrderLineStatus::ExchangeInTransit, Some(("kr.cjlogistics", "111")));
        let pending = exchange(line.id, None, false);
        assert!(build_candidates(std::slice::from_ref(&line), &[pending]).is_empty());
    }
}
