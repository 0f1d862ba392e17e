pub mod client;
pub mod error;
pub mod sse;
pub mod types;

pub use client::McpClient;
pub use error::McpError;
pub use types::{parse_full_name, McpServerConfig, Tool};
