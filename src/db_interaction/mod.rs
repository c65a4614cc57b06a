pub mod branches;
pub mod cart;
pub mod lifecycle;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod settlement;
pub mod users;

pub use branches::*;
pub use cart::*;
pub use lifecycle::*;
pub use notifications::*;
pub use orders::*;
pub use payments::*;
pub use settlement::*;
pub use users::*;
