use serde_json::Value;
use tribal_cache::ToolUsage;

/// Status of one in-flight or completed tool call, for progress rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Calling,
    Complete,
    Error,
}

/// Transient per-iteration record of a tool call, used purely for progress
/// rendering. Converted to a [`tribal_cache::ToolUsage`] once the call
/// settles, for inclusion in `ProcessingResult::tools_used` and cache
/// entries.
#[derive(Debug, Clone)]
pub struct ToolCallInfo {
    pub server: String,
    pub tool: String,
    pub arguments: Value,
    pub status: ToolStatus,
    pub detail: String,
}

impl ToolCallInfo {
    pub fn new(server: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        let detail = crate::detail::tool_call_detail(&arguments);
        Self {
            server: server.into(),
            tool: tool.into(),
            arguments,
            status: ToolStatus::Calling,
            detail,
        }
    }

    pub fn to_usage(&self) -> ToolUsage {
        ToolUsage {
            server: self.server.clone(),
            tool: self.tool.clone(),
            arguments: self.arguments.clone(),
            detail: self.detail.clone(),
        }
    }
}

/// Result of running the agent loop over one user message.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub response_text: String,
    pub used_fallback: bool,
    pub actual_model: String,
    pub tools_used: Vec<ToolUsage>,
    pub iterations: u32,
    pub sql_queries: Vec<String>,
    pub progress_events: Vec<String>,
    pub from_cache: bool,
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn from_cached(cached: &tribal_cache::CachedResponse) -> Self {
        Self {
            response_text: cached.response_text.clone(),
            used_fallback: false,
            actual_model: String::new(),
            tools_used: cached.tools_used.clone(),
            iterations: 0,
            sql_queries: cached.sql_queries.clone(),
            progress_events: cached.progress_events.clone(),
            from_cache: true,
            error: None,
        }
    }
}
