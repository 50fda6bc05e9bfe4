pub mod notifications;
pub mod orders;
pub mod reconciliation;
pub mod refunds;
pub mod returns;
pub mod tracking;
