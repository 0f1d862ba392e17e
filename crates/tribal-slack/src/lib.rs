pub mod dispatch;
pub mod error;
pub mod home;
pub mod index;
pub mod mention;
pub mod placeholder;
pub mod render;
pub mod socket;
pub mod state;

pub use error::{Result, SlackError};
pub use state::DispatcherState;
