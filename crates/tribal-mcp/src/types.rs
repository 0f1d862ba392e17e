use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string declared to every MCP server during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Configuration for a single MCP server. Not persisted — provided at
/// startup from `TribalConfig`.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub server_id: String,
    pub url: String,
    pub description: String,
    pub enabled: bool,
}

/// A tool exposed by one MCP server, as discovered during `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server_id: String,
    pub server_url: String,
}

impl Tool {
    /// `server_id "__" name` — exactly two underscores, unique across all
    /// enabled servers.
    pub fn full_name(&self) -> String {
        format!("{}__{}", self.server_id, self.name)
    }

    /// OpenAI-compatible tool-calling schema entry.
    pub fn to_model_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.full_name(),
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// Split a full tool name on its first `__` separator into
/// `(server_id, tool_name)`.
pub fn parse_full_name(full_name: &str) -> Option<(&str, &str)> {
    full_name.split_once("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_and_parse_round_trip() {
        let tool = Tool {
            name: "execute_query".to_string(),
            description: "run sql".to_string(),
            input_schema: serde_json::json!({}),
            server_id: "postgres-mcp".to_string(),
            server_url: "http://localhost:9001".to_string(),
        };
        let full = tool.full_name();
        assert_eq!(full, "postgres-mcp__execute_query");
        assert_eq!(parse_full_name(&full), Some(("postgres-mcp", "execute_query")));
    }

    #[test]
    fn parse_splits_on_first_separator_only() {
        // A tool name that itself contains "__" must still parse correctly:
        // the server_id is whatever precedes the *first* "__".
        assert_eq!(
            parse_full_name("synth-mcp__search__tables"),
            Some(("synth-mcp", "search__tables"))
        );
    }
}
