use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_CONTEXT_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const DEFAULT_CACHE_FUZZY_THRESHOLD: f64 = 0.99;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Top-level config (`tribal.toml` plus the environment variables named in
/// spec.md §6 — each has its own name, not a shared `TRIBAL_` prefix).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TribalConfig {
    pub slack: SlackConfig,
    pub mcp: McpConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub bot_token: String,
    pub app_token: String,
    pub signing_secret: String,
}

/// Base URLs of the schema-discovery and SQL-execution MCP servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    pub synth_url: String,
    pub postgres_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "bool_true")]
    pub fallback_enabled: bool,
    pub openrouter_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// When true, the Agent Loop writes through to the cache on every
    /// successful answer. When false (default) saving requires the 📦
    /// reaction in the thread.
    #[serde(default)]
    pub auto_save: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl(),
            fuzzy_threshold: default_fuzzy_threshold(),
            auto_save: false,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_primary_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}
fn default_fallback_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}
fn default_fuzzy_threshold() -> f64 {
    DEFAULT_CACHE_FUZZY_THRESHOLD
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tribal/tribal.db", home)
}

impl TribalConfig {
    /// Load config from a TOML file with the spec's named environment
    /// variables overlaid on top.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `~/.tribal/tribal.toml`
    ///
    /// Unlike a single `Env::prefixed(...)` section, spec.md §6 names each
    /// variable individually (`SLACK_BOT_TOKEN`, `MCP_SYNTH_URL`,
    /// `LLM_PRIMARY_MODEL`, ...) rather than sharing one common prefix, so
    /// each is mapped explicitly onto its nested config path.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TribalConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Serialized::defaults(env_overrides()))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// Build a sparse JSON overlay from the environment variables spec.md §6
/// names. Only variables that are actually set are included, so file
/// values and struct defaults still apply when a variable is absent.
fn env_overrides() -> Value {
    let mut root = json!({});

    set_str(&mut root, &["slack", "bot_token"], "SLACK_BOT_TOKEN");
    set_str(&mut root, &["slack", "app_token"], "SLACK_APP_TOKEN");
    set_str(&mut root, &["slack", "signing_secret"], "SLACK_SIGNING_SECRET");

    set_str(&mut root, &["mcp", "synth_url"], "MCP_SYNTH_URL");
    set_str(&mut root, &["mcp", "postgres_url"], "MCP_POSTGRES_URL");

    set_str(&mut root, &["llm", "primary_model"], "LLM_PRIMARY_MODEL");
    set_str(&mut root, &["llm", "fallback_model"], "LLM_FALLBACK_MODEL");
    set_bool(&mut root, &["llm", "fallback_enabled"], "LLM_FALLBACK_ENABLED");
    set_str(&mut root, &["llm", "openrouter_api_key"], "OPENROUTER_API_KEY");
    set_str(&mut root, &["llm", "openai_api_key"], "OPENAI_API_KEY");

    set_str(&mut root, &["database", "path"], "THREAD_CONTEXT_DB");

    set_bool(&mut root, &["cache", "enabled"], "CACHE_ENABLED");
    set_u64(&mut root, &["cache", "ttl_seconds"], "CACHE_TTL_SECONDS");
    set_f64(&mut root, &["cache", "fuzzy_threshold"], "CACHE_FUZZY_THRESHOLD");
    set_bool(&mut root, &["cache", "auto_save"], "CACHE_AUTO_SAVE");

    set_str(&mut root, &["log_level"], "LOG_LEVEL");

    root
}

fn set_at(root: &mut Value, path: &[&str], value: Value) {
    let mut node = root;
    for key in &path[..path.len() - 1] {
        node = node.as_object_mut().unwrap().entry(*key).or_insert_with(|| json!({}));
    }
    node.as_object_mut().unwrap().insert(path[path.len() - 1].to_string(), value);
}

fn set_str(root: &mut Value, path: &[&str], var: &str) {
    if let Ok(v) = std::env::var(var) {
        set_at(root, path, json!(v));
    }
}

fn set_bool(root: &mut Value, path: &[&str], var: &str) {
    if let Ok(v) = std::env::var(var) {
        let parsed = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        set_at(root, path, json!(parsed));
    }
}

fn set_u64(root: &mut Value, path: &[&str], var: &str) {
    if let Ok(Ok(v)) = std::env::var(var).map(|s| s.parse::<u64>()) {
        set_at(root, path, json!(v));
    }
}

fn set_f64(root: &mut Value, path: &[&str], var: &str) {
    if let Ok(Ok(v)) = std::env::var(var).map(|s| s.parse::<f64>()) {
        set_at(root, path, json!(v));
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tribal/tribal.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn set_at_builds_nested_objects() {
        let mut root = json!({});
        set_at(&mut root, &["a", "b"], json!("v"));
        assert_eq!(root["a"]["b"], "v");
    }

    #[test]
    fn loads_toml_file_with_cache_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [slack]
            bot_token = "xoxb-test"
            app_token = "xapp-test"
            signing_secret = "secret"

            [mcp]
            synth_url = "http://localhost:9000"
            postgres_url = "http://localhost:9001"

            [llm]
            openrouter_api_key = "or-key"
            openai_api_key = "oai-key"
            "#
        )
        .unwrap();

        let config = TribalConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.slack.bot_token, "xoxb-test");
        assert_eq!(config.mcp.synth_url, "http://localhost:9000");
        assert_eq!(config.llm.primary_model, "anthropic/claude-sonnet-4");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, DEFAULT_CACHE_TTL_SECONDS);
        assert!(!config.cache.auto_save);
    }
}
