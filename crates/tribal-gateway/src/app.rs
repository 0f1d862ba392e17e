use std::sync::Arc;

use rusqlite::Connection;
use slack_morphism::prelude::*;
use tracing::{info, warn};

use tribal_agent::AgentLoop;
use tribal_cache::QueryCacheStore;
use tribal_context::ThreadContextStore;
use tribal_core::config::TribalConfig;
use tribal_llm::{FallbackLlmProvider, LlmProvider};
use tribal_mcp::{McpClient, McpServerConfig};
use tribal_slack::DispatcherState;

/// Well-known base URLs for the two OpenAI-compatible back-ends. Neither
/// is configurable today — both vendors are fixed by spec.md §6, only
/// their API keys and model ids vary.
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Build every C1–C6 component from config and wire them into a shared
/// `DispatcherState`, mirroring `skynet-gateway::app::AppState::new`'s role
/// as the single assembly point for the process.
pub async fn build_dispatcher_state(config: &TribalConfig) -> anyhow::Result<Arc<DispatcherState>> {
    std::fs::create_dir_all(
        std::path::Path::new(&config.database.path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new(".")),
    )?;

    let context_conn = Connection::open(&config.database.path)?;
    let contexts = Arc::new(ThreadContextStore::new(context_conn)?);

    let cache = if config.cache.enabled {
        let cache_conn = Connection::open(&config.database.path)?;
        Some(Arc::new(QueryCacheStore::new(cache_conn, config.cache.ttl_seconds, config.cache.fuzzy_threshold)?))
    } else {
        None
    };

    let mcp = Arc::new(McpClient::new(vec![
        McpServerConfig {
            server_id: "synth-mcp".to_string(),
            url: config.mcp.synth_url.clone(),
            description: "schema discovery server".to_string(),
            enabled: true,
        },
        McpServerConfig {
            server_id: "postgres-mcp".to_string(),
            url: config.mcp.postgres_url.clone(),
            description: "read-only SQL execution server".to_string(),
            enabled: true,
        },
    ]));

    let primary: Option<Box<dyn LlmProvider>> = config.llm.openrouter_api_key.clone().map(|key| {
        Box::new(tribal_llm::openai_compat::OpenAiCompatProvider::new(
            "openrouter",
            key,
            OPENROUTER_BASE_URL.to_string(),
            config.llm.primary_model.clone(),
        )) as Box<dyn LlmProvider>
    });

    let fallback: Option<Box<dyn LlmProvider>> = config.llm.openai_api_key.clone().map(|key| {
        Box::new(tribal_llm::openai_compat::OpenAiCompatProvider::new(
            "openai",
            key,
            OPENAI_BASE_URL.to_string(),
            config.llm.fallback_model.clone(),
        )) as Box<dyn LlmProvider>
    });

    if primary.is_none() {
        warn!("no OPENROUTER_API_KEY configured, primary LLM back-end disabled");
    }
    if fallback.is_none() {
        warn!("no OPENAI_API_KEY configured, fallback LLM back-end disabled");
    }

    let llm = Arc::new(FallbackLlmProvider::new(primary, fallback, config.llm.fallback_enabled, config.llm.max_retries));
    let llm_fallback_status = llm.fallback_status();

    let agent = Arc::new(AgentLoop::new(mcp.clone(), llm.clone(), cache.clone(), config.cache.auto_save));

    mcp.initialize().await;
    let connectivity = mcp.test_connectivity().await;
    for status in &connectivity {
        if status.reachable {
            info!(server = %status.server_id, tools = status.tool_count, "mcp server reachable");
        } else {
            warn!(server = %status.server_id, "mcp server unreachable at startup, continuing without it");
        }
    }

    let client = Arc::new(SlackClient::new(SlackClientHyperConnector::new()));
    let token = SlackApiToken::new(SlackApiTokenValue(config.slack.bot_token.clone()));

    let bot_identity = client.open_session(&token).auth_test().await?;

    Ok(Arc::new(DispatcherState {
        client,
        token,
        contexts,
        cache,
        cache_auto_save: config.cache.auto_save,
        cache_enabled: config.cache.enabled,
        mcp,
        agent,
        llm_primary_model: config.llm.primary_model.clone(),
        llm_fallback_status,
        index: tribal_slack::index::MessageIndex::new(),
        bot_user_id: bot_identity.user_id.to_string(),
    }))
}
