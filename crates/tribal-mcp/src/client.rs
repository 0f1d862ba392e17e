use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::error::{McpError, Result};
use crate::sse::parse_sse_response;
use crate::types::{parse_full_name, McpServerConfig, Tool, PROTOCOL_VERSION};

const SESSION_HEADER: &str = "mcp-session-id";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of a connectivity probe against one server, used by the
/// Lifecycle Supervisor at startup and by the Slack home-tab view.
#[derive(Debug, Clone)]
pub struct ConnectivityStatus {
    pub server_id: String,
    pub reachable: bool,
    pub tool_count: usize,
}

/// Multi-server MCP client: negotiates a session per server, lists tools,
/// and dispatches `tools/call`. Session tokens and the tool catalog are
/// held only in memory for the lifetime of this client.
pub struct McpClient {
    http: reqwest::Client,
    servers: HashMap<String, McpServerConfig>,
    sessions: Mutex<HashMap<String, String>>,
    tools: Mutex<HashMap<String, Tool>>,
}

impl McpClient {
    pub fn new(servers: Vec<McpServerConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");

        Self {
            http,
            servers: servers.into_iter().map(|s| (s.server_id.clone(), s)).collect(),
            sessions: Mutex::new(HashMap::new()),
            tools: Mutex::new(HashMap::new()),
        }
    }

    /// Open a session and populate the tool catalog for every enabled
    /// server. A server whose handshake fails is logged and excluded; its
    /// absence is not fatal to the others.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let server_ids: Vec<String> = self.servers.keys().cloned().collect();
        for server_id in server_ids {
            if !self.servers[&server_id].enabled {
                continue;
            }
            if let Err(e) = self.initialize_server(&server_id).await {
                warn!(server_id = %server_id, error = %e, "failed to initialize MCP server, skipping");
            }
        }
    }

    async fn initialize_server(&self, server_id: &str) -> Result<()> {
        self.initialize_session(server_id).await?;
        self.fetch_tools(server_id).await
    }

    async fn initialize_session(&self, server_id: &str) -> Result<()> {
        let config = self.servers.get(server_id).ok_or_else(|| McpError::UnknownServer(server_id.to_string()))?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": "tribal-bot", "version": env!("CARGO_PKG_VERSION") },
            }
        });

        let response = self
            .http
            .post(&config.url)
            .headers(default_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| McpError::Transport {
                server_id: server_id.to_string(),
                source: e,
            })?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| McpError::MissingSessionHeader {
                server_id: server_id.to_string(),
            })?;

        self.sessions.lock().unwrap().insert(server_id.to_string(), session_id);
        Ok(())
    }

    async fn fetch_tools(&self, server_id: &str) -> Result<()> {
        let config = self.servers.get(server_id).ok_or_else(|| McpError::UnknownServer(server_id.to_string()))?.clone();
        let session_id = self.session_for(server_id);

        let body = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} });
        let envelope = self.post(&config.url, session_id.as_deref(), &body, server_id).await?;

        let mut tools = self.tools.lock().unwrap();
        tools.retain(|_, t| t.server_id != server_id);

        if let Some(list) = envelope["result"]["tools"].as_array() {
            for raw in list {
                let name = raw["name"].as_str().unwrap_or_default().to_string();
                if name.is_empty() {
                    continue;
                }
                let tool = Tool {
                    name: name.clone(),
                    description: raw["description"].as_str().unwrap_or_default().to_string(),
                    input_schema: raw.get("inputSchema").cloned().unwrap_or_else(|| json!({})),
                    server_id: server_id.to_string(),
                    server_url: config.url.clone(),
                };
                tools.insert(tool.full_name(), tool);
            }
        }
        Ok(())
    }

    /// Snapshot of the current tool catalog.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.lock().unwrap().values().cloned().collect()
    }

    /// The catalog rendered in OpenAI-compatible tool-calling format.
    pub fn tools_for_model(&self) -> Vec<Value> {
        self.tools.lock().unwrap().values().map(Tool::to_model_format).collect()
    }

    /// Invoke a tool by its full name. Errors are returned as a JSON
    /// `{"error": ...}` value rather than an `Err`, so the Agent Loop can
    /// surface them to the model as a regular tool result.
    #[instrument(skip(self, arguments), fields(full_name = %full_name))]
    pub async fn call_tool(&self, full_name: &str, arguments: Value) -> Value {
        let Some((server_id, tool_name)) = parse_full_name(full_name) else {
            return json!({ "error": format!("malformed tool name: {full_name}") });
        };

        let Some(config) = self.servers.get(server_id) else {
            return json!({ "error": format!("unknown server: {server_id}") });
        };

        match self.call_tool_inner(config, tool_name, arguments.clone()).await {
            Ok(value) => value,
            Err(_) => {
                // Transport failure or an explicit JSON-RPC error envelope —
                // both re-initialize once and retry, per spec.md's "on any
                // transport-level or explicit session error" contract.
                if self.initialize_server(server_id).await.is_err() {
                    return json!({ "error": format!("server {server_id} is unreachable") });
                }
                match self.call_tool_inner(config, tool_name, arguments).await {
                    Ok(value) => value,
                    Err(McpError::ToolError(error)) => json!({ "error": error }),
                    Err(e) => json!({ "error": e.to_string() }),
                }
            }
        }
    }

    /// Returns `Err(McpError::ToolError)` for a JSON-RPC `error` envelope, not
    /// `Ok`, so `call_tool`'s reinit-and-retry branch also covers explicit
    /// session/tool errors reported inside an otherwise-successful response.
    async fn call_tool_inner(&self, config: &McpServerConfig, tool_name: &str, arguments: Value) -> Result<Value> {
        let session_id = self.session_for(&config.server_id);
        let body = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": { "name": tool_name, "arguments": arguments }
        });

        let envelope = self.post(&config.url, session_id.as_deref(), &body, &config.server_id).await?;

        if let Some(error) = envelope.get("error") {
            return Err(McpError::ToolError(error.clone()));
        }
        Ok(envelope.get("result").cloned().unwrap_or(envelope))
    }

    /// Probe every enabled server's reachability without mutating session
    /// state materially beyond what `initialize` already does.
    pub async fn test_connectivity(&self) -> Vec<ConnectivityStatus> {
        let mut statuses = Vec::new();
        for (server_id, config) in &self.servers {
            if !config.enabled {
                continue;
            }
            let tool_count = self
                .tools
                .lock()
                .unwrap()
                .values()
                .filter(|t| &t.server_id == server_id)
                .count();
            statuses.push(ConnectivityStatus {
                server_id: server_id.clone(),
                reachable: self.sessions.lock().unwrap().contains_key(server_id),
                tool_count,
            });
        }
        statuses
    }

    pub fn close(&self) {
        self.sessions.lock().unwrap().clear();
        self.tools.lock().unwrap().clear();
    }

    fn session_for(&self, server_id: &str) -> Option<String> {
        self.sessions.lock().unwrap().get(server_id).cloned()
    }

    async fn post(&self, url: &str, session_id: Option<&str>, body: &Value, server_id: &str) -> Result<Value> {
        let mut request = self.http.post(url).headers(default_headers()).json(body);
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await.map_err(|e| McpError::Transport {
            server_id: server_id.to_string(),
            source: e,
        })?;
        let text = response.text().await.map_err(|e| McpError::Transport {
            server_id: server_id.to_string(),
            source: e,
        })?;
        Ok(parse_sse_response(&text))
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_has_empty_catalog() {
        let client = McpClient::new(vec![McpServerConfig {
            server_id: "synth-mcp".to_string(),
            url: "http://localhost:9000".to_string(),
            description: "schema discovery".to_string(),
            enabled: true,
        }]);
        assert!(client.tools().is_empty());
        assert!(client.tools_for_model().is_empty());
    }

    #[tokio::test]
    async fn call_tool_with_malformed_name_returns_error_value_not_err() {
        let client = McpClient::new(vec![]);
        let result = client.call_tool("not-namespaced", json!({})).await;
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn call_tool_for_unknown_server_returns_error_value() {
        let client = McpClient::new(vec![]);
        let result = client.call_tool("ghost-mcp__ping", json!({})).await;
        assert!(result.get("error").is_some());
    }

    /// Matches a JSON-RPC request by its `method` field, since every MCP
    /// method is posted to the same URL.
    struct JsonRpcMethod(&'static str);

    impl wiremock::Match for JsonRpcMethod {
        fn matches(&self, request: &wiremock::Request) -> bool {
            serde_json::from_slice::<Value>(&request.body)
                .ok()
                .and_then(|body| body.get("method").and_then(Value::as_str).map(|m| m == self.0))
                .unwrap_or(false)
        }
    }

    /// Returns a JSON-RPC error envelope on the first `tools/call`, then a
    /// successful result on every call after — simulating a session that
    /// expired and was re-established.
    struct FlakyToolCallResponder {
        calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }

    impl wiremock::Respond for FlakyToolCallResponder {
        fn respond(&self, _request: &wiremock::Request) -> wiremock::ResponseTemplate {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call == 0 {
                wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 3,
                    "error": { "code": -32000, "message": "session expired" }
                }))
            } else {
                wiremock::ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 3,
                    "result": { "content": [{ "type": "text", "text": "pong" }] }
                }))
            }
        }
    }

    #[tokio::test]
    async fn call_tool_reinitializes_and_retries_on_json_rpc_error_envelope() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(JsonRpcMethod("initialize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SESSION_HEADER, "sess-1")
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": {} })),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(JsonRpcMethod("tools/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 2, "result": { "tools": [] } })))
            .mount(&server)
            .await;

        let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        Mock::given(method("POST"))
            .and(JsonRpcMethod("tools/call"))
            .respond_with(FlakyToolCallResponder { calls: calls.clone() })
            .mount(&server)
            .await;

        let client = McpClient::new(vec![McpServerConfig {
            server_id: "test-mcp".to_string(),
            url: server.uri(),
            description: "flaky session server".to_string(),
            enabled: true,
        }]);

        client.initialize().await;

        let result = client.call_tool("test-mcp__ping", json!({})).await;

        assert!(result.get("error").is_none(), "expected the retried call to succeed, got {result:?}");
        assert_eq!(
            calls.load(std::sync::atomic::Ordering::SeqCst),
            2,
            "expected exactly one reinit-and-retry after the JSON-RPC error envelope"
        );
    }
}
