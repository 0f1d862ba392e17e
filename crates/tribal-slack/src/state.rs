use std::sync::Arc;

use slack_morphism::prelude::{SlackApiToken, SlackHyperClient};
use tribal_agent::AgentLoop;
use tribal_cache::QueryCacheStore;
use tribal_context::ThreadContextStore;
use tribal_llm::FallbackStatus;
use tribal_mcp::McpClient;

use crate::index::MessageIndex;

/// Everything the Event Dispatcher needs, built once by the Lifecycle
/// Supervisor (C8) and shared behind an `Arc` with every socket-mode
/// callback — the Slack analogue of `skynet-gateway`'s `AppState`.
pub struct DispatcherState {
    pub client: Arc<SlackHyperClient>,
    pub token: SlackApiToken,
    pub contexts: Arc<ThreadContextStore>,
    pub cache: Option<Arc<QueryCacheStore>>,
    pub cache_auto_save: bool,
    pub cache_enabled: bool,
    pub mcp: Arc<McpClient>,
    pub agent: Arc<AgentLoop>,
    pub llm_primary_model: String,
    pub llm_fallback_status: FallbackStatus,
    pub index: MessageIndex,
    pub bot_user_id: String,
}
