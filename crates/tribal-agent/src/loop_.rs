use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use tribal_cache::QueryCacheStore;
use tribal_context::ThreadContext;
use tribal_llm::{ChatRequest, LlmProvider};
use tribal_mcp::McpClient;

use crate::convert::{system_message, to_chat_message, to_context_tool_call};
use crate::progress::{analyzing_results_suffix, format_progress_message};
use crate::prompt::build_system_prompt;
use crate::sink::ProgressSink;
use crate::types::{ProcessingResult, ToolCallInfo, ToolStatus};

/// Hard bound on agentic-loop iterations, matching spec.md's `MAX_ITERATIONS`.
pub const MAX_ITERATIONS: u32 = 10;

/// Trailing context window fed to the LLM each iteration — distinct from
/// the thread-context store's own default tail bound (20).
pub const MAX_CONTEXT_MESSAGES: usize = 15;

/// Max tokens and temperature used for every chat-completions call.
const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.0;

/// Spacing between replayed progress events on a cache hit, reproducing
/// the felt progression of a live run without re-running any tool calls.
const CACHE_REPLAY_DELAY: Duration = Duration::from_millis(400);

/// Bounded tool-calling loop: composes the system prompt and thread
/// history, calls the LLM provider, executes tool calls via the MCP
/// client, and emits progress updates — with an optional query cache that
/// can short-circuit the whole turn.
pub struct AgentLoop {
    mcp: Arc<McpClient>,
    llm: Arc<dyn LlmProvider>,
    cache: Option<Arc<QueryCacheStore>>,
    cache_auto_save: bool,
}

impl AgentLoop {
    pub fn new(mcp: Arc<McpClient>, llm: Arc<dyn LlmProvider>, cache: Option<Arc<QueryCacheStore>>, cache_auto_save: bool) -> Self {
        Self { mcp, llm, cache, cache_auto_save }
    }

    /// Process one user message against a thread's context. Appends the
    /// user message (and, on a cache miss, every assistant/tool turn) to
    /// `ctx` before returning; the caller is responsible for persisting
    /// `ctx` afterward.
    #[instrument(skip(self, ctx, progress), fields(thread_key = %ctx.thread_key()))]
    pub async fn process_message(
        &self,
        ctx: &mut ThreadContext,
        user_message: &str,
        user_id: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> ProcessingResult {
        let now = Utc::now().to_rfc3339();
        ctx.add_user_message(user_message, user_id.map(str::to_string), &now);

        if let Some(cache) = &self.cache {
            match cache.find_match(user_message) {
                Ok(Some(cached)) => {
                    info!("cache hit, replaying progress");
                    for event in &cached.progress_events {
                        progress.send(event.clone()).await;
                        tokio::time::sleep(CACHE_REPLAY_DELAY).await;
                    }
                    let now = Utc::now().to_rfc3339();
                    ctx.add_assistant_message(cached.response_text.clone(), None, &now);
                    return ProcessingResult::from_cached(&cached);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cache lookup failed, proceeding without it"),
            }
        }

        let result = self.run_loop(ctx, progress).await;

        if self.cache_auto_save && result.error.is_none() {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.save(user_message, &result.response_text, &result.tools_used, &result.sql_queries, &result.progress_events) {
                    warn!(error = %e, "failed to auto-save cache entry");
                }
            }
        }

        result
    }

    async fn run_loop(&self, ctx: &mut ThreadContext, progress: &dyn ProgressSink) -> ProcessingResult {
        let tool_catalog = self.mcp.tools();
        let tool_full_names: Vec<String> = tool_catalog.iter().map(|t| t.full_name()).collect();
        let system_prompt = build_system_prompt(&tool_full_names);
        let tools_for_model = self.mcp.tools_for_model();

        let mut tools_used = Vec::new();
        let mut tools_completed: Vec<ToolCallInfo> = Vec::new();
        let mut sql_queries = Vec::new();
        let mut progress_events = Vec::new();
        let mut used_fallback = false;
        let mut actual_model = String::new();
        let mut iteration = 0u32;

        while iteration < MAX_ITERATIONS {
            iteration += 1;
            debug!(iteration, "agent loop iteration");

            let mut messages = vec![system_message(system_prompt.clone())];
            messages.extend(ctx.get_messages_for_llm(MAX_CONTEXT_MESSAGES).into_iter().map(to_chat_message));

            let request = ChatRequest {
                model: String::new(),
                messages,
                tools: tools_for_model.clone(),
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            };

            let response = match self.llm.send(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "llm call failed inside agent loop");
                    return ProcessingResult {
                        response_text: format!("I encountered an error: {e}"),
                        used_fallback,
                        actual_model,
                        tools_used,
                        iterations: iteration,
                        sql_queries,
                        progress_events,
                        from_cache: false,
                        error: Some(e.to_string()),
                    };
                }
            };

            used_fallback = response.used_fallback;
            actual_model = response.actual_model.clone();

            if response.tool_calls.is_empty() {
                let now = Utc::now().to_rfc3339();
                ctx.add_assistant_message(response.content.clone(), None, &now);
                let final_text = if response.content.is_empty() {
                    "I processed your request but have no response.".to_string()
                } else {
                    response.content
                };
                return ProcessingResult {
                    response_text: final_text,
                    used_fallback,
                    actual_model,
                    tools_used,
                    iterations: iteration,
                    sql_queries,
                    progress_events,
                    from_cache: false,
                    error: None,
                };
            }

            let now = Utc::now().to_rfc3339();
            let context_tool_calls = response.tool_calls.iter().map(to_context_tool_call).collect();
            ctx.add_assistant_message(response.content.clone(), Some(context_tool_calls), &now);

            for call in &response.tool_calls {
                let arguments: Value = serde_json::from_str(&call.arguments).unwrap_or_else(|_| serde_json::json!({}));
                let (server_id, tool_name) = tribal_mcp::parse_full_name(&call.name).unwrap_or(("unknown", call.name.as_str()));

                let mut info = ToolCallInfo::new(server_id, tool_name, arguments.clone());

                let update = format_progress_message(std::slice::from_ref(&info), &tools_completed);
                progress_events.push(update.clone());
                progress.send(update).await;

                info!(tool = %call.name, "calling tool");
                let result = self.mcp.call_tool(&call.name, arguments.clone()).await;
                info.status = if result.get("error").is_some() { ToolStatus::Error } else { ToolStatus::Complete };

                if let Some(sql) = arguments.get("sql").and_then(Value::as_str) {
                    sql_queries.push(sql.to_string());
                }

                tools_used.push(info.to_usage());
                tools_completed.push(info);

                let result_str = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
                let now = Utc::now().to_rfc3339();
                ctx.add_tool_result(call.id.clone(), result_str, &now);
            }

            let mut analyzing = format_progress_message(&[], &tools_completed);
            analyzing.push_str(analyzing_results_suffix());
            progress_events.push(analyzing.clone());
            progress.send(analyzing).await;
        }

        warn!(max_iterations = MAX_ITERATIONS, "agent loop exhausted its iteration budget");
        ProcessingResult {
            response_text: "I reached the maximum number of tool calls. Here's what I found so far.".to_string(),
            used_fallback,
            actual_model,
            tools_used,
            iterations: iteration,
            sql_queries,
            progress_events,
            from_cache: false,
            error: None,
        }
    }
}
