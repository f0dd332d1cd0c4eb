pub mod commit;
pub mod machine;
pub mod service;

pub use commit::{CommitCoordinator, COMMIT_STATUS_MESSAGES};
pub use machine::{Reservation, ReservationState};
pub use service::ReservationService;
