use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{
    order_line,
    return_request::{self, Entity as ReturnRequest},
};
use crate::errors::ServiceError;
use crate::models::{RequestKind, RequesterType};

/// Fields a new return/exchange/cancel request starts with.
#[derive(Debug, Clone)]
pub struct RequestDraft {
    pub kind: RequestKind,
    pub requester_type: RequesterType,
    pub requester_id: Option<Uuid>,
    pub reason_code: String,
    pub reason_text: Option<String>,
    /// Defaults to the full line quantity
    pub quantity: Option<i32>,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub address: Option<String>,
    pub address_detail: Option<String>,
    pub zip_code: Option<String>,
}

impl RequestDraft {
    /// Request opened by an admin status change, with no member-supplied details.
    pub fn from_admin(kind: RequestKind) -> Self {
        Self {
            kind,
            requester_type: RequesterType::Admin,
            requester_id: None,
            reason_code: "ADMIN".to_string(),
            reason_text: None,
            quantity: None,
            receiver_name: None,
            receiver_phone: None,
            address: None,
            address_detail: None,
            zip_code: None,
        }
    }
}

/// Newest request on the line that is neither canceled nor deleted,
/// optionally restricted to one kind.
pub async fn find_active_request<C: ConnectionTrait>(
    conn: &C,
    line_id: Uuid,
    kind: Option<RequestKind>,
) -> Result<Option<return_request::Model>, ServiceError> {
    let mut query = ReturnRequest::find()
        .filter(return_request::Column::OrderLineId.eq(line_id))
        .filter(return_request::Column::Deleted.eq(false))
        .filter(return_request::Column::Canceled.eq(false));
    if let Some(kind) = kind {
        query = query.filter(return_request::Column::Kind.eq(kind));
    }
    Ok(query
        .order_by_desc(return_request::Column::CreatedAt)
        .one(conn)
        .await?)
}

pub async fn lock_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<return_request::Model, ServiceError> {
    ReturnRequest::find_by_id(request_id)
        .filter(return_request::Column::Deleted.eq(false))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("request", request_id))
}

/// `DuplicateRequest` when the line already has an active request of any kind.
pub async fn ensure_no_active_request<C: ConnectionTrait>(
    conn: &C,
    line_id: Uuid,
) -> Result<(), ServiceError> {
    match find_active_request(conn, line_id, None).await? {
        Some(existing) => Err(ServiceError::DuplicateRequest(format!(
            "order line {} already has active {} request {}",
            line_id, existing.kind, existing.id
        ))),
        None => Ok(()),
    }
}

/// Inserts a request for the line. A line carries at most one active
/// request; the caller holds the line lock.
pub async fn insert_request<C: ConnectionTrait>(
    conn: &C,
    line: &order_line::Model,
    draft: RequestDraft,
) -> Result<return_request::Model, ServiceError> {
    ensure_no_active_request(conn, line.id).await?;

    let quantity = draft.quantity.unwrap_or(line.quantity);
    if quantity <= 0 || quantity > line.quantity {
        return Err(ServiceError::ValidationError(format!(
            "request quantity {} must be between 1 and {}",
            quantity, line.quantity
        )));
    }

    let now = Utc::now();
    let request = return_request::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_line_id: Set(line.id),
        kind: Set(draft.kind),
        requester_type: Set(draft.requester_type),
        requester_id: Set(draft.requester_id),
        reason_code: Set(draft.reason_code),
        reason_text: Set(draft.reason_text),
        quantity: Set(quantity),
        approved: Set(None),
        canceled: Set(false),
        receiver_name: Set(draft.receiver_name),
        receiver_phone: Set(draft.receiver_phone),
        address: Set(draft.address),
        address_detail: Set(draft.address_detail),
        zip_code: Set(draft.zip_code),
        pickup_courier_code: Set(None),
        pickup_tracking_number: Set(None),
        pickup_shipment_id: Set(None),
        redelivery_courier_code: Set(None),
        redelivery_tracking_number: Set(None),
        redelivery_shipment_id: Set(None),
        deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(request.insert(conn).await?)
}

/// Withdraws every active request on the line. Returns the withdrawn ids.
pub async fn cancel_active_requests<C: ConnectionTrait>(
    conn: &C,
    line_id: Uuid,
) -> Result<Vec<Uuid>, ServiceError> {
    let active = ReturnRequest::find()
        .filter(return_request::Column::OrderLineId.eq(line_id))
        .filter(return_request::Column::Deleted.eq(false))
        .filter(return_request::Column::Canceled.eq(false))
        .all(conn)
        .await?;

    let mut withdrawn = Vec::with_capacity(active.len());
    for request in active {
        withdrawn.push(request.id);
        let mut model: return_request::ActiveModel = request.into();
        model.canceled = Set(true);
        model.updated_at = Set(Utc::now());
        model.update(conn).await?;
    }
    Ok(withdrawn)
}
