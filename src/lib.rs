pub mod amounts;
pub mod configuration;
pub mod db_interaction;
pub mod domain;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod session_state;
pub mod startup;
pub mod stripe_client;
pub mod telemetry;
pub mod utils;
pub mod whatsapp_client;
