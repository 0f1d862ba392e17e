use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, TokenUsage, ToolCall};

/// An OpenAI-compatible `/chat/completions` back-end. Both the primary
/// (e.g. an OpenRouter-style gateway) and the fallback speak this same
/// shape, so one implementation serves both provider slots; each is
/// constructed with its own fixed `model` (`LLM_PRIMARY_MODEL` /
/// `LLM_FALLBACK_MODEL`) since the two back-ends are different vendors and
/// a model id valid on one means nothing on the other. `ChatRequest::model`
/// is therefore left blank by callers and ignored here.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
    provider_name: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(provider_name: impl Into<String>, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            chat_path: "/chat/completions".to_string(),
            provider_name: provider_name.into(),
            model,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}{}", self.base_url, self.chat_path);
        let body = serde_json::json!({
            "model": self.model,
            "messages": req.messages,
            "tools": req.tools,
            "tool_choice": "auto",
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        });

        debug!(model = %self.model, provider = %self.provider_name, "sending chat completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();

        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if status == 402 {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::QuotaExhausted(text));
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, provider = %self.provider_name, "chat completion API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(api_resp, self.model.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

pub(crate) fn parse_response(resp: ApiResponse, model: String) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let content = choice.as_ref().and_then(|c| c.message.content.clone()).unwrap_or_default();
    let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone()).unwrap_or_default();

    let tool_calls = choice
        .as_ref()
        .and_then(|c| c.message.tool_calls.as_ref())
        .map(|calls| {
            calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments: tc.function.arguments.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let tokens = resp
        .usage
        .map(|u| TokenUsage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
            total: u.total_tokens,
        })
        .unwrap_or_default();

    ChatResponse {
        content,
        tool_calls,
        tokens,
        finish_reason,
        used_fallback: false,
        actual_model: model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_calls_and_usage() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "synth-mcp__search_tables", "arguments": "{\"query\":\"merchants\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120 }
        });
        let api_resp: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_response(api_resp, "gpt-4o".to_string());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "synth-mcp__search_tables");
        assert_eq!(response.tokens.total, 120);
        assert_eq!(response.finish_reason, "tool_calls");
    }
}
