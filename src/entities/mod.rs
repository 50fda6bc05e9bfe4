pub mod member_post;
pub mod order;
pub mod order_line;
pub mod point_ledger;
pub mod payment;
pub mod post;
pub mod return_request;
pub mod shipping_address;
