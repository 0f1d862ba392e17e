pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::ContextError;
pub use manager::ThreadContextStore;
pub use types::{LlmMessage, Message, ThreadContext, ToolCall};
