pub mod cancel;
pub mod change;
pub mod models;
pub mod repository;

pub use cancel::{CancelFlow, CancelRequest, CancelStep};
pub use change::{ChangeFlow, ChangeRequest, ChangeStep};
pub use models::{Order, OrderStatus};
pub use repository::OrderRepository;
