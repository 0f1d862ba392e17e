use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("transport error talking to server {server_id}: {source}")]
    Transport {
        server_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server {server_id} did not return an mcp-session-id header during initialize")]
    MissingSessionHeader { server_id: String },

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("malformed full tool name: {0}")]
    MalformedFullName(String),

    /// A JSON-RPC `error` envelope reported by a `tools/call` response — an
    /// explicit session or tool-level error, not a transport failure. Carried
    /// as `Err` (rather than folded into the `Ok` value) so `call_tool`'s
    /// reinit-and-retry branch applies to it the same as a transport error.
    #[error("tool call returned a JSON-RPC error: {0}")]
    ToolError(serde_json::Value),
}

pub type Result<T> = std::result::Result<T, McpError>;
