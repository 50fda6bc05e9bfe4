pub mod approve_request_command;
pub mod create_request_command;
pub mod delete_request_command;
pub mod record_request_tracking_command;
pub mod update_request_command;

pub use approve_request_command::ApproveRequestCommand;
pub use create_request_command::{CreateRequestCommand, CreateRequestResult};
pub use delete_request_command::DeleteRequestCommand;
pub use record_request_tracking_command::{RecordRequestTrackingCommand, ShippingLeg};
pub use update_request_command::UpdateRequestCommand;

use crate::{
    entities::{order_line, return_request},
    errors::ServiceError,
    repositories::{order_repository, request_repository},
};
use sea_orm::{DatabaseTransaction, EntityTrait};
use uuid::Uuid;

/// Locks a request together with its order line, line first.
pub(crate) async fn lock_request_with_line(
    txn: &DatabaseTransaction,
    request_id: Uuid,
) -> Result<(return_request::Model, order_line::Model), ServiceError> {
    let unlocked = return_request::Entity::find_by_id(request_id)
        .one(txn)
        .await?
        .filter(|request| !request.deleted)
        .ok_or_else(|| ServiceError::not_found("request", request_id))?;

    let line = order_repository::lock_line(txn, unlocked.order_line_id).await?;
    let request = request_repository::lock_request(txn, request_id).await?;
    Ok((request, line))
}
