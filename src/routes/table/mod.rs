pub mod events;
pub mod get;
pub mod join;

pub use events::table_events;
pub use get::get_table;
pub use join::join;
