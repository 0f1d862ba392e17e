use serde::{Deserialize, Serialize};

/// A record of one tool invocation, as surfaced in a cached answer's
/// context block (`tool → detail`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub server: String,
    pub tool: String,
    pub arguments: serde_json::Value,
    pub detail: String,
}

/// A stored question/answer pair plus everything needed to replay its
/// progress on a cache hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub id: i64,
    pub question_text: String,
    pub question_normalized: String,
    pub question_hash: String,
    pub response_text: String,
    pub tools_used: Vec<ToolUsage>,
    pub sql_queries: Vec<String>,
    pub progress_events: Vec<String>,
    pub hit_count: u64,
    pub created_at: String,
    pub last_hit_at: Option<String>,
}

/// Statistics reported on the Slack home-tab view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    pub total_hits: u64,
    pub avg_hit_count: f64,
    pub oldest_entry: Option<String>,
    pub newest_entry: Option<String>,
}
