pub mod end;
pub mod pay;

pub use end::{post_end_order, post_end_order_ack};
pub use pay::post_payment;
