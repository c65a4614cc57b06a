pub mod payment_method;
pub mod user_color;
pub mod user_name;

pub use payment_method::PaymentMethod;
pub use user_color::pick_user_color;
pub use user_name::UserName;
