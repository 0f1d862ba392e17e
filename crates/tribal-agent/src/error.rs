use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm provider error: {0}")]
    Llm(#[from] tribal_llm::ProviderError),

    #[error("cache error: {0}")]
    Cache(#[from] tribal_cache::CacheError),

    #[error("context store error: {0}")]
    Context(#[from] tribal_context::ContextError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
