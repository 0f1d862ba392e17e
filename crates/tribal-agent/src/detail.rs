use serde_json::Value;

/// Short human string summarizing what a tool call is doing, for progress
/// rendering. Mirrors `ToolCallInfo.detail` from the original Python bot:
/// SQL execution surfaces the first table named after `FROM`, named
/// table/table_name args surface the table, search-style `query` args
/// surface a short quoted form, list-style `limit` args surface the limit,
/// anything else renders no detail at all.
pub fn tool_call_detail(arguments: &Value) -> String {
    let Some(obj) = arguments.as_object() else {
        return String::new();
    };

    if let Some(sql) = obj.get("sql").and_then(Value::as_str) {
        return sql_detail(sql);
    }

    if let Some(table) = obj.get("table").and_then(Value::as_str) {
        return format!("`{table}`");
    }

    if let Some(table) = obj.get("table_name").and_then(Value::as_str) {
        return format!("`{table}`");
    }

    if let Some(query) = obj.get("query").and_then(Value::as_str) {
        return if query.chars().count() > 30 {
            format!("\"{}...\"", query.chars().take(30).collect::<String>())
        } else {
            format!("\"{query}\"")
        };
    }

    if let Some(limit) = obj.get("limit") {
        if !obj.contains_key("query") {
            return format!("(limit {limit})");
        }
    }

    String::new()
}

/// Extract the first table named after `FROM` in a SQL string (case
/// insensitive), stripping a `synthetic.` schema prefix if present.
fn sql_detail(sql: &str) -> String {
    let Some(from_idx) = find_from_keyword(sql) else {
        return "_query_".to_string();
    };

    let after = &sql[from_idx..];
    let Some(first_token) = after.split_whitespace().next() else {
        return String::new();
    };

    let table = first_token.strip_prefix("synthetic.").unwrap_or(first_token);
    if table.is_empty() {
        String::new()
    } else {
        format!("`{table}`")
    }
}

/// Byte offset just past the first ASCII-case-insensitive `FROM ` in `sql`,
/// matched directly against `sql`'s own bytes so the returned offset is
/// always safe to slice with — `to_uppercase()` can change a string's byte
/// length (e.g. `ß` -> `SS`), which would misalign an offset found in an
/// uppercased copy against the original.
fn find_from_keyword(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    const NEEDLE: &[u8] = b"FROM ";
    if bytes.len() < NEEDLE.len() {
        return None;
    }
    (0..=bytes.len() - NEEDLE.len())
        .find(|&start| sql.is_char_boundary(start) && bytes[start..start + NEEDLE.len()].eq_ignore_ascii_case(NEEDLE))
        .map(|start| start + NEEDLE.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sql_argument_extracts_table_after_from() {
        let detail = tool_call_detail(&json!({ "sql": "SELECT COUNT(*) FROM synthetic.merchants" }));
        assert_eq!(detail, "`merchants`");
    }

    #[test]
    fn sql_without_from_falls_back_to_query_marker() {
        let detail = tool_call_detail(&json!({ "sql": "EXPLAIN ANALYZE SELECT 1" }));
        assert_eq!(detail, "_query_");
    }

    #[test]
    fn table_argument_is_backtick_quoted() {
        let detail = tool_call_detail(&json!({ "table": "orders" }));
        assert_eq!(detail, "`orders`");
    }

    #[test]
    fn table_name_argument_is_backtick_quoted() {
        let detail = tool_call_detail(&json!({ "table_name": "orders" }));
        assert_eq!(detail, "`orders`");
    }

    #[test]
    fn short_query_argument_is_quoted_verbatim() {
        let detail = tool_call_detail(&json!({ "query": "merchants" }));
        assert_eq!(detail, "\"merchants\"");
    }

    #[test]
    fn long_query_argument_is_truncated_with_ellipsis() {
        let long = "a".repeat(40);
        let detail = tool_call_detail(&json!({ "query": long }));
        assert_eq!(detail, format!("\"{}...\"", "a".repeat(30)));
    }

    #[test]
    fn limit_without_query_renders_limit_detail() {
        let detail = tool_call_detail(&json!({ "limit": 10 }));
        assert_eq!(detail, "(limit 10)");
    }

    #[test]
    fn limit_with_query_prefers_query_detail() {
        let detail = tool_call_detail(&json!({ "query": "x", "limit": 10 }));
        assert_eq!(detail, "\"x\"");
    }

    #[test]
    fn unrecognized_arguments_produce_no_detail() {
        assert_eq!(tool_call_detail(&json!({ "foo": "bar" })), "");
    }
}
