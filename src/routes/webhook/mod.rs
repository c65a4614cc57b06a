pub mod stripe;

pub use stripe::stripe_webhook;
