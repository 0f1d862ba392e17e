use crate::types::{ToolCallInfo, ToolStatus};

/// Render a progress update: a header line, a checklist of finished tools
/// (`✓ tool → detail`), and a checklist of in-flight tools (`⋯ tool →
/// detail`). The exact glyphs are a presentation detail; the structure
/// (header, completed, in-flight) is not.
pub fn format_progress_message(in_progress: &[ToolCallInfo], completed: &[ToolCallInfo]) -> String {
    let mut lines = vec!["\u{1f914} *Working on it...*\n".to_string()];

    for tool in completed {
        let detail = if tool.detail.is_empty() {
            String::new()
        } else {
            format!(" \u{2192} {}", tool.detail)
        };
        match tool.status {
            ToolStatus::Complete => lines.push(format!("\u{2705} `{}`{detail}", tool.tool)),
            ToolStatus::Error => lines.push(format!("\u{274c} `{}`{detail} (error)", tool.tool)),
            ToolStatus::Calling => lines.push(format!("\u{23f3} `{}`{detail}", tool.tool)),
        }
    }

    for tool in in_progress {
        let detail = if tool.detail.is_empty() {
            String::new()
        } else {
            format!(" \u{2192} {}", tool.detail)
        };
        lines.push(format!("\u{23f3} `{}`{detail}", tool.tool));
    }

    lines.join("\n")
}

/// Progress update appended once all of one turn's tool calls have
/// returned, while the result is sent back to the model.
pub fn analyzing_results_suffix() -> &'static str {
    "\n\n\u{1f4ad} _Analyzing results..._"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_tools_render_checkmarks_with_detail() {
        let mut tool = ToolCallInfo::new("synth-mcp", "search_tables", json!({ "query": "merchants" }));
        tool.status = ToolStatus::Complete;
        let message = format_progress_message(&[], &[tool]);
        assert!(message.contains("\u{2705} `search_tables` \u{2192} \"merchants\""));
    }

    #[test]
    fn in_progress_tools_render_hourglass() {
        let tool = ToolCallInfo::new("postgres-mcp", "execute_query", json!({ "sql": "SELECT 1 FROM synthetic.merchants" }));
        let message = format_progress_message(&[tool], &[]);
        assert!(message.contains("\u{23f3} `execute_query` \u{2192} `merchants`"));
    }

    #[test]
    fn errored_tools_render_cross_mark() {
        let mut tool = ToolCallInfo::new("postgres-mcp", "execute_query", json!({}));
        tool.status = ToolStatus::Error;
        let message = format_progress_message(&[], &[tool]);
        assert!(message.contains("\u{274c} `execute_query` (error)"));
    }
}
