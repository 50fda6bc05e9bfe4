pub mod create_order_command;
pub mod delete_order_command;
pub mod delete_order_line_command;
pub mod merge_order_lines_command;
pub mod record_tracking_command;
pub mod split_order_line_command;
pub mod update_order_line_status_command;
pub mod update_order_memo_command;

// Re-export commands for easier access
pub use create_order_command::{
    CreateOrderCommand, CreateOrderResult, NewOrderLine, NewPayment, NewShippingAddress,
};
pub use delete_order_command::DeleteOrderCommand;
pub use delete_order_line_command::DeleteOrderLineCommand;
pub use merge_order_lines_command::{MergeOrderLinesCommand, MergeOrderLinesResult};
pub use record_tracking_command::RecordTrackingCommand;
pub use split_order_line_command::{SplitOrderLineCommand, SplitOrderLineResult};
pub use update_order_line_status_command::{
    UpdateOrderLineStatusCommand, UpdateOrderLineStatusResult,
};
pub use update_order_memo_command::{AcknowledgeMemoCommand, UpdateOrderMemoCommand};
