use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// How an error should be handled by the retry/fallback policy.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    /// Credits/quota exhausted — definitional, not transient. No retry.
    Quota,
    /// Transport-level or rate-limit failure that may resolve on retry.
    Retryable,
    /// Anything else — no retry, cut straight to fallback.
    Other,
}

const QUOTA_PATTERNS: &[&str] = &["credits", "insufficient", "can only afford", "quota exceeded"];
const RETRYABLE_PATTERNS: &[&str] = &["timeout", "rate limit", "429", "503", "504", "connection", "network"];

fn classify(err: &ProviderError) -> ErrorClass {
    match err {
        ProviderError::QuotaExhausted(_) => ErrorClass::Quota,
        ProviderError::RateLimited { .. } => ErrorClass::Retryable,
        ProviderError::Http(_) => ErrorClass::Retryable,
        ProviderError::Api { status, message } => {
            let lower = message.to_lowercase();
            if *status == 402 || QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
                ErrorClass::Quota
            } else if (500..600).contains(status) || RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p)) {
                ErrorClass::Retryable
            } else {
                ErrorClass::Other
            }
        }
        ProviderError::Parse(_) | ProviderError::Unavailable(_) => ErrorClass::Other,
    }
}

/// Exponential backoff, capped at 10s: `min(1 * 2^(attempt-1), 10)` seconds.
fn backoff_duration(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX).min(10);
    Duration::from_secs(secs)
}

/// Whether the fallback back-end is enabled and configured, surfaced on the
/// Slack home-tab view.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackStatus {
    pub enabled: bool,
    pub configured: bool,
}

/// Ordered two-tier LLM caller: primary retried up to `max_retries` times
/// with classification-based backoff, fallback invoked at most once as a
/// last resort.
pub struct FallbackLlmProvider {
    primary: Option<Box<dyn LlmProvider>>,
    fallback: Option<Box<dyn LlmProvider>>,
    fallback_enabled: bool,
    max_retries: u32,
}

impl FallbackLlmProvider {
    pub fn new(
        primary: Option<Box<dyn LlmProvider>>,
        fallback: Option<Box<dyn LlmProvider>>,
        fallback_enabled: bool,
        max_retries: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            fallback_enabled,
            max_retries,
        }
    }

    pub fn fallback_status(&self) -> FallbackStatus {
        FallbackStatus {
            enabled: self.fallback_enabled,
            configured: self.fallback.is_some(),
        }
    }

    async fn call_fallback(&self, req: &ChatRequest, primary_err: Option<ProviderError>) -> Result<ChatResponse, ProviderError> {
        if !self.fallback_enabled {
            return Err(primary_err.unwrap_or_else(|| ProviderError::Unavailable("no primary configured and fallback disabled".to_string())));
        }
        let Some(fallback) = &self.fallback else {
            return Err(primary_err.unwrap_or_else(|| ProviderError::Unavailable("no fallback configured".to_string())));
        };

        match fallback.send(req).await {
            Ok(mut resp) => {
                resp.used_fallback = true;
                resp.actual_model = fallback.name().to_string();
                info!(model = %resp.actual_model, "LLM request served by fallback");
                Ok(resp)
            }
            Err(fallback_err) => Err(ProviderError::Unavailable(format!(
                "primary: {}; fallback: {}",
                primary_err.map(|e| e.to_string()).unwrap_or_else(|| "not configured".to_string()),
                fallback_err
            ))),
        }
    }
}

#[async_trait]
impl LlmProvider for FallbackLlmProvider {
    fn name(&self) -> &str {
        "fallback-policy"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let Some(primary) = &self.primary else {
            return self.call_fallback(req, None).await;
        };

        let mut last_err: Option<ProviderError> = None;
        let mut attempt = 0;
        while attempt < self.max_retries.max(1) {
            attempt += 1;
            match primary.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    let class = classify(&err);
                    warn!(attempt, ?class, error = %err, "primary LLM call failed");
                    match class {
                        ErrorClass::Quota | ErrorClass::Other => {
                            last_err = Some(err);
                            break;
                        }
                        ErrorClass::Retryable => {
                            last_err = Some(err);
                            if attempt < self.max_retries {
                                tokio::time::sleep(backoff_duration(attempt)).await;
                                continue;
                            }
                            break;
                        }
                    }
                }
            }
        }

        self.call_fallback(req, last_err).await
    }
}

impl std::fmt::Debug for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorClass::Quota => "quota",
            ErrorClass::Retryable => "retryable",
            ErrorClass::Other => "other",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TokenUsage;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![],
            tools: vec![],
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    fn ok_response(model: &str) -> ChatResponse {
        ChatResponse {
            content: "answer".to_string(),
            tool_calls: vec![],
            tokens: TokenUsage::default(),
            finish_reason: "stop".to_string(),
            used_fallback: false,
            actual_model: model.to_string(),
        }
    }

    struct AlwaysOk {
        name: &'static str,
    }

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            self.name
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ok_response(self.name))
        }
    }

    struct AlwaysErr {
        name: &'static str,
        calls: AtomicU32,
        err: fn() -> ProviderError,
    }

    #[async_trait]
    impl LlmProvider for AlwaysErr {
        fn name(&self) -> &str {
            self.name
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.err)())
        }
    }

    #[tokio::test]
    async fn succeeds_on_primary_without_touching_fallback() {
        let provider = FallbackLlmProvider::new(Some(Box::new(AlwaysOk { name: "primary" })), Some(Box::new(AlwaysOk { name: "fallback" })), true, 2);
        let resp = provider.send(&request()).await.unwrap();
        assert_eq!(resp.actual_model, "primary");
        assert!(!resp.used_fallback);
    }

    #[tokio::test]
    async fn credits_error_never_retries_and_falls_back_immediately() {
        let primary = AlwaysErr {
            name: "primary",
            calls: AtomicU32::new(0),
            err: || ProviderError::Api { status: 402, message: "insufficient credits".to_string() },
        };
        let provider = FallbackLlmProvider::new(Some(Box::new(primary)), Some(Box::new(AlwaysOk { name: "fallback" })), true, 2);

        let start = std::time::Instant::now();
        let resp = provider.send(&request()).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500), "credits path must never sleep");
        assert!(resp.used_fallback);
        assert_eq!(resp.actual_model, "fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_retries_up_to_max_then_falls_back() {
        let primary = std::sync::Arc::new(AlwaysErr {
            name: "primary",
            calls: AtomicU32::new(0),
            err: || ProviderError::RateLimited { retry_after_ms: 1000 },
        });

        struct Wrapper(std::sync::Arc<AlwaysErr>);
        #[async_trait]
        impl LlmProvider for Wrapper {
            fn name(&self) -> &str {
                self.0.name
            }
            async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
                self.0.send(req).await
            }
        }

        let provider = FallbackLlmProvider::new(
            Some(Box::new(Wrapper(primary.clone()))),
            Some(Box::new(AlwaysOk { name: "fallback" })),
            true,
            2,
        );

        let resp = provider.send(&request()).await.unwrap();
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2, "should retry exactly max_retries times");
        assert!(resp.used_fallback);
    }

    #[tokio::test]
    async fn fallback_disabled_surfaces_primary_error() {
        let primary = AlwaysErr {
            name: "primary",
            calls: AtomicU32::new(0),
            err: || ProviderError::Api { status: 500, message: "boom".to_string() },
        };
        let provider = FallbackLlmProvider::new(Some(Box::new(primary)), Some(Box::new(AlwaysOk { name: "fallback" })), false, 1);
        let err = provider.send(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[tokio::test]
    async fn both_fail_returns_aggregate_unavailable() {
        let primary = AlwaysErr {
            name: "primary",
            calls: AtomicU32::new(0),
            err: || ProviderError::Api { status: 500, message: "primary down".to_string() },
        };
        let fallback = AlwaysErr {
            name: "fallback",
            calls: AtomicU32::new(0),
            err: || ProviderError::Api { status: 500, message: "fallback down".to_string() },
        };
        let provider = FallbackLlmProvider::new(Some(Box::new(primary)), Some(Box::new(fallback)), true, 1);
        let err = provider.send(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
