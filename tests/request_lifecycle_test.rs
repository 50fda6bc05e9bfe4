mod common;

use assert_matches::assert_matches;
use common::{Scripted, TestApp, CJ, EPOST};
use mall_fulfillment::{
    commands::{
        orders::UpdateOrderLineStatusCommand,
        returns::{ShippingLeg, UpdateRequestCommand},
    },
    errors::ServiceError,
    models::{ApprovalState, OrderLineStatus, RequestKind, RequesterType, TransitionError},
    repositories::request_repository::{self, RequestDraft},
};
use uuid::Uuid;

/// Ships the line and lets reconciliation mark it delivered.
async fn delivered_line(app: &TestApp, product: &str, quantity: i32, tracking: &str) -> Uuid {
    let order = app
        .create_order(Uuid::new_v4(), &[(product, quantity)], None)
        .await;
    let line_id = order.line_ids[0];
    app.ship(line_id, CJ, tracking).await;
    app.provider.set(CJ, tracking, Scripted::Delivered);
    app.state.reconciler().run_once().await.unwrap();
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Delivered);
    line_id
}

#[tokio::test]
async fn opening_a_return_moves_the_line_and_starts_pending() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Hoodie", 2, "1001").await;

    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();

    assert_eq!(request.kind, RequestKind::Return);
    assert_eq!(request.requester_type, RequesterType::Member);
    assert_eq!(request.quantity, 2);
    assert_eq!(request.approval(), ApprovalState::Pending);
    assert!(request.is_active());
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::ReturnRequested
    );
}

#[tokio::test]
async fn a_second_active_request_is_a_duplicate() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Leggings", 1, "1002").await;
    app.open_request(line_id, RequestKind::Return).await.unwrap();

    assert_matches!(
        app.open_request(line_id, RequestKind::Return).await,
        Err(ServiceError::DuplicateRequest(_))
    );
    assert_matches!(
        app.open_request(line_id, RequestKind::Exchange).await,
        Err(ServiceError::DuplicateRequest(_))
    );

    // The status route refuses the same way.
    let err = app
        .state
        .services
        .orders
        .update_line_status(UpdateOrderLineStatusCommand {
            order_line_id: line_id,
            status: OrderLineStatus::ReturnRequested,
            reason_code: None,
            reason_text: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateRequest(_));
}

#[tokio::test]
async fn requests_must_follow_the_status_machine() {
    let app = TestApp::new().await;
    let order = app
        .create_order(Uuid::new_v4(), &[("Sports bra", 1)], None)
        .await;
    let line_id = order.line_ids[0];

    assert_matches!(
        app.open_request(line_id, RequestKind::Return).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Paid);
}

#[tokio::test]
async fn request_quantity_cannot_exceed_the_line() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Socks 3-pack", 2, "1003").await;

    let err = app
        .state
        .services
        .returns
        .create_request(mall_fulfillment::commands::returns::CreateRequestCommand {
            order_line_id: line_id,
            kind: RequestKind::Return,
            requester_type: RequesterType::Admin,
            requester_id: None,
            reason_code: "DAMAGED".into(),
            reason_text: None,
            quantity: Some(3),
            receiver_name: None,
            receiver_phone: None,
            address: None,
            address_detail: None,
            zip_code: None,
        })
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Delivered);
}

#[tokio::test]
async fn approval_flips_the_flag_without_moving_the_line() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Knee sleeve", 1, "1004").await;
    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();

    let approved = app
        .state
        .services
        .returns
        .approve_request(request.id, true)
        .await
        .unwrap();
    assert_eq!(approved.approval(), ApprovalState::Approved);
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::ReturnRequested
    );

    let rejected = app
        .state
        .services
        .returns
        .approve_request(request.id, false)
        .await
        .unwrap();
    assert_eq!(rejected.approval(), ApprovalState::Rejected);
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::ReturnRequested
    );

    app.set_status(line_id, OrderLineStatus::Returned).await;
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Returned);
}

#[tokio::test]
async fn falling_back_to_delivered_withdraws_the_request() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Wrist wraps", 1, "1005").await;
    let request = app
        .open_request(line_id, RequestKind::Exchange)
        .await
        .unwrap();

    let result = app
        .state
        .services
        .orders
        .update_line_status(UpdateOrderLineStatusCommand {
            order_line_id: line_id,
            status: OrderLineStatus::Delivered,
            reason_code: None,
            reason_text: None,
        })
        .await
        .unwrap();

    assert_eq!(result.withdrawn_request_ids, vec![request.id]);
    let withdrawn = app.state.services.returns.get_request(request.id).await.unwrap();
    assert!(withdrawn.canceled);

    // A withdrawn request can no longer be approved.
    assert_matches!(
        app.state.services.returns.approve_request(request.id, true).await,
        Err(ServiceError::Conflict(_))
    );

    // And the line is free for a new one.
    let again = app
        .open_request(line_id, RequestKind::Exchange)
        .await
        .unwrap();
    assert_ne!(again.id, request.id);
}

#[tokio::test]
async fn cancel_request_round_trip_on_a_paid_line() {
    let app = TestApp::new().await;
    let order = app
        .create_order(Uuid::new_v4(), &[("Pre-workout", 1)], None)
        .await;
    let line_id = order.line_ids[0];

    let request = app.open_request(line_id, RequestKind::Cancel).await.unwrap();
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::CancelRequested
    );

    app.set_status(line_id, OrderLineStatus::Paid).await;
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Paid);
    assert!(
        app.state
            .services
            .returns
            .get_request(request.id)
            .await
            .unwrap()
            .canceled
    );
}

#[tokio::test]
async fn admin_status_change_opens_the_matching_request() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Lifting belt", 1, "1006").await;

    let result = app
        .state
        .services
        .orders
        .update_line_status(UpdateOrderLineStatusCommand {
            order_line_id: line_id,
            status: OrderLineStatus::ReturnRequested,
            reason_code: Some("DEFECT".into()),
            reason_text: Some("Buckle snapped".into()),
        })
        .await
        .unwrap();

    let request_id = result.request_id.expect("request opened");
    let request = app.state.services.returns.get_request(request_id).await.unwrap();
    assert_eq!(request.kind, RequestKind::Return);
    assert_eq!(request.requester_type, RequesterType::Admin);
    assert_eq!(request.reason_code, "DEFECT");
    assert_eq!(request.reason_text.as_deref(), Some("Buckle snapped"));
}

#[tokio::test]
async fn partial_update_leaves_other_fields_alone() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Gym bag", 3, "1007").await;
    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();

    let updated = app
        .state
        .services
        .returns
        .update_request(UpdateRequestCommand {
            request_id: request.id,
            quantity: Some(1),
            zip_code: Some("04524".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.quantity, 1);
    assert_eq!(updated.zip_code.as_deref(), Some("04524"));
    assert_eq!(updated.reason_code, request.reason_code);
    assert_eq!(updated.reason_text, request.reason_text);
    assert_eq!(updated.approved, None);
    assert!(!updated.canceled);

    assert_matches!(
        app.state
            .services
            .returns
            .update_request(UpdateRequestCommand {
                request_id: request.id,
                quantity: Some(4),
                ..Default::default()
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn tracking_legs_are_recorded_independently() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Trail shoes", 1, "1008").await;
    let exchange = app
        .open_request(line_id, RequestKind::Exchange)
        .await
        .unwrap();

    let with_pickup = app
        .track_request(exchange.id, ShippingLeg::Pickup, EPOST, "P-1")
        .await
        .unwrap();
    assert_eq!(with_pickup.pickup_tracking_number.as_deref(), Some("P-1"));
    assert_eq!(with_pickup.redelivery_tracking(), None);

    let with_both = app
        .track_request(exchange.id, ShippingLeg::Redelivery, CJ, "R-1")
        .await
        .unwrap();
    assert_eq!(with_both.pickup_tracking_number.as_deref(), Some("P-1"));
    assert_eq!(with_both.redelivery_tracking(), Some((CJ, "R-1")));
}

#[tokio::test]
async fn returns_have_no_redelivery_leg() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Cap", 1, "1009").await;
    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();

    assert_matches!(
        app.track_request(request.id, ShippingLeg::Redelivery, CJ, "R-2")
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        app.track_request(request.id, ShippingLeg::Pickup, CJ, "  ")
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn deleted_requests_disappear() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Water bottle", 1, "1010").await;
    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();

    app.state
        .services
        .returns
        .delete_request(request.id)
        .await
        .unwrap();

    assert_matches!(
        app.state.services.returns.get_request(request.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.services.returns.delete_request(request.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn hold_remembers_where_the_line_came_from() {
    let app = TestApp::new().await;
    let order = app
        .create_order(Uuid::new_v4(), &[("Creatine", 1)], None)
        .await;
    let line_id = order.line_ids[0];

    app.set_status(line_id, OrderLineStatus::Hold).await;
    let held = app.line(line_id).await;
    assert_eq!(held.status, OrderLineStatus::Hold);
    assert_eq!(held.held_from, Some(OrderLineStatus::Paid));
    assert_eq!(held.effective_status(), OrderLineStatus::Paid);

    assert_matches!(
        app.move_line(line_id, OrderLineStatus::Hold).await,
        Err(ServiceError::InvalidTransition(_))
    );

    app.set_status(line_id, OrderLineStatus::Paid).await;
    let released = app.line(line_id).await;
    assert_eq!(released.status, OrderLineStatus::Paid);
    assert_eq!(released.held_from, None);

    // Anything the held-from status allows is open too.
    app.set_status(line_id, OrderLineStatus::Hold).await;
    let result = app
        .move_line(line_id, OrderLineStatus::CancelRequested)
        .await
        .unwrap();
    assert!(result.request_id.is_some());
    assert_eq!(app.line(line_id).await.held_from, None);
}

#[tokio::test]
async fn hold_cannot_shortcut_delivery() {
    let app = TestApp::new().await;
    let order = app
        .create_order(Uuid::new_v4(), &[("Resistance bands", 1)], None)
        .await;
    let line_id = order.line_ids[0];
    app.ship(line_id, CJ, "1011").await;
    app.set_status(line_id, OrderLineStatus::Hold).await;

    let err = app
        .move_line(line_id, OrderLineStatus::Delivered)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidTransition(TransitionError::ReconciliationOnly {
            from: OrderLineStatus::InTransit,
            to: OrderLineStatus::Delivered,
        })
    );
    assert_matches!(
        app.move_line(line_id, OrderLineStatus::Confirmed).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::Hold);

    app.set_status(line_id, OrderLineStatus::InTransit).await;
    assert_eq!(app.line(line_id).await.status, OrderLineStatus::InTransit);
}

#[tokio::test]
async fn held_line_keeps_its_single_request() {
    let app = TestApp::new().await;
    let line_id = delivered_line(&app, "Grip trainer", 1, "1012").await;
    let request = app.open_request(line_id, RequestKind::Return).await.unwrap();
    app.set_status(line_id, OrderLineStatus::Hold).await;

    assert_matches!(
        app.move_line(line_id, OrderLineStatus::ExchangeRequested).await,
        Err(ServiceError::DuplicateRequest(_))
    );
    assert_matches!(
        app.open_request(line_id, RequestKind::Exchange).await,
        Err(ServiceError::DuplicateRequest(_))
    );

    let resumed = app
        .move_line(line_id, OrderLineStatus::ReturnRequested)
        .await
        .unwrap();
    assert_eq!(resumed.request_id, None);
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::ReturnRequested
    );

    let active = app.active_requests(line_id).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, request.id);
}

#[tokio::test]
async fn unpaid_lines_never_get_an_approved_request() {
    let app = TestApp::new().await;
    let order = app
        .create_unpaid_order(Uuid::new_v4(), &[("Day pass", 1)])
        .await;
    let line_id = order.line_ids[0];
    assert_eq!(
        app.line(line_id).await.status,
        OrderLineStatus::PendingPayment
    );
    app.set_status(line_id, OrderLineStatus::Hold).await;

    assert_matches!(
        app.open_request(line_id, RequestKind::Return).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert!(app.active_requests(line_id).await.is_empty());

    // Even a request written straight to the store cannot be approved.
    let line = app.line(line_id).await;
    let request = request_repository::insert_request(
        app.db(),
        &line,
        RequestDraft::from_admin(RequestKind::Return),
    )
    .await
    .unwrap();

    assert_matches!(
        app.state.services.returns.approve_request(request.id, true).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        app.state
            .services
            .returns
            .update_request(UpdateRequestCommand {
                request_id: request.id,
                approved: Some(true),
                ..Default::default()
            })
            .await,
        Err(ServiceError::Conflict(_))
    );
    let stored = app.state.services.returns.get_request(request.id).await.unwrap();
    assert_eq!(stored.approval(), ApprovalState::Pending);
}
