use serde_json::Value;

/// Extract the JSON-RPC envelope from a response body that may be framed as
/// Server-Sent-Events. Scans lines for the first one beginning with
/// `data: `, parses the remainder as JSON. Falls back to parsing the whole
/// body as plain JSON, and returns `{}` if neither succeeds.
pub fn parse_sse_response(body: &str) -> Value {
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(value) = serde_json::from_str(data) {
                return value;
            }
        }
    }

    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sse_framed_body() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
        let value = parse_sse_response(body);
        assert_eq!(value["result"]["ok"], true);
    }

    #[test]
    fn falls_back_to_plain_json() {
        let body = "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}";
        let value = parse_sse_response(body);
        assert_eq!(value["jsonrpc"], "2.0");
    }

    #[test]
    fn returns_empty_object_on_garbage() {
        let value = parse_sse_response("not json at all");
        assert_eq!(value, serde_json::json!({}));
    }
}
