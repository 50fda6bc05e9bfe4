mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::TestApp;
use mall_fulfillment::{entities::point_ledger, errors::ServiceError};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn grant_points(app: &TestApp, member_id: Uuid, order_id: Uuid, amount: i64) {
    point_ledger::ActiveModel {
        id: Set(Uuid::new_v4()),
        member_id: Set(member_id),
        order_id: Set(order_id),
        amount: Set(amount),
        reason: Set("PURCHASE".into()),
        deleted: Set(false),
        created_at: Set(Utc::now()),
    }
    .insert(app.db())
    .await
    .unwrap();
}

async fn live_points(app: &TestApp, order_id: Uuid) -> usize {
    point_ledger::Entity::find()
        .filter(point_ledger::Column::OrderId.eq(order_id))
        .filter(point_ledger::Column::Deleted.eq(false))
        .all(app.db())
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn partial_then_full_refund_reverses_points_once() {
    let app = TestApp::new().await;
    let member = Uuid::new_v4();
    let order = app.create_order(member, &[("Annual PT package", 1)], None).await;
    let payment_id = order.payment_ids[0];
    grant_points(&app, member, order.order_id, 500).await;
    grant_points(&app, member, order.order_id, 120).await;

    let partial = app
        .state
        .services
        .refunds
        .refund_payment(payment_id, dec!(20000))
        .await
        .unwrap();
    assert!(!partial.fully_refunded);
    assert_eq!(partial.reversed_point_entries, 0);
    assert_eq!(partial.payment.refunded_amount, dec!(20000));
    assert_eq!(live_points(&app, order.order_id).await, 2);

    let full = app
        .state
        .services
        .refunds
        .refund_payment(payment_id, dec!(30000))
        .await
        .unwrap();
    assert!(full.fully_refunded);
    assert_eq!(full.reversed_point_entries, 2);
    assert_eq!(full.payment.refunded_amount, dec!(50000));
    assert_eq!(live_points(&app, order.order_id).await, 0);

    assert_eq!(
        app.gateway.calls(),
        vec![(payment_id, dec!(20000)), (payment_id, dec!(30000))]
    );
}

#[tokio::test]
async fn refunds_never_exceed_what_was_paid() {
    let app = TestApp::new().await;
    let order = app.create_order(Uuid::new_v4(), &[("Locker rental", 1)], None).await;
    let payment_id = order.payment_ids[0];

    assert_matches!(
        app.state
            .services
            .refunds
            .refund_payment(payment_id, dec!(50000.01))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        app.state
            .services
            .refunds
            .refund_payment(payment_id, dec!(0))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert!(app.gateway.calls().is_empty());
    assert_eq!(app.payment(payment_id).await.refunded_amount, dec!(0));
}

#[tokio::test]
async fn gateway_refusal_records_nothing() {
    let app = TestApp::new().await;
    let member = Uuid::new_v4();
    let order = app.create_order(member, &[("Massage gun", 1)], None).await;
    let payment_id = order.payment_ids[0];
    grant_points(&app, member, order.order_id, 300).await;
    app.gateway.refuse(true);

    assert_matches!(
        app.state
            .services
            .refunds
            .refund_payment(payment_id, dec!(50000))
            .await,
        Err(ServiceError::UpstreamError(_))
    );
    assert_eq!(app.payment(payment_id).await.refunded_amount, dec!(0));
    assert_eq!(live_points(&app, order.order_id).await, 1);
}

#[tokio::test]
async fn unknown_payment_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state
            .services
            .refunds
            .refund_payment(Uuid::new_v4(), dec!(1000))
            .await,
        Err(ServiceError::NotFound(_))
    );
}
