use thiserror::Error;

/// Errors produced by the Slack adapter.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack api error: {0}")]
    Api(String),

    #[error("http transport error: {0}")]
    Http(String),

    #[error("no thread context for this message, ignoring")]
    NoContext,

    #[error("context store error: {0}")]
    Context(#[from] tribal_context::ContextError),

    #[error("cache error: {0}")]
    Cache(#[from] tribal_cache::CacheError),
}

pub type Result<T> = std::result::Result<T, SlackError>;
