pub mod delete;
pub mod post;

pub use delete::delete_cart_item;
pub use post::post_cart_item;
