pub mod admin;
pub mod config;
pub mod error;
pub mod session;
pub mod tracker;

pub use admin::AdminConsole;
pub use config::ClientConfig;
pub use error::GameError;
pub use session::{GameSession, Notification};
pub use tracker::{AcquisitionError, Fix, PositionTracker};
