use std::sync::Arc;

use async_trait::async_trait;
use slack_morphism::prelude::*;
use tracing::warn;
use tribal_agent::ProgressSink;

/// A posted "thinking" placeholder message, edited in place for every
/// progress update and for the final answer. The Event Dispatcher posts
/// one of these before running the agent loop, per spec.md §4.6's ack-
/// deadline note (the loop itself runs in a detached task).
pub struct SlackPlaceholder {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    channel_id: SlackChannelId,
    message_ts: SlackTs,
}

impl SlackPlaceholder {
    pub fn new(client: Arc<SlackHyperClient>, token: SlackApiToken, channel_id: SlackChannelId, message_ts: SlackTs) -> Self {
        Self { client, token, channel_id, message_ts }
    }

    pub fn message_ts(&self) -> &SlackTs {
        &self.message_ts
    }

    async fn update_text(&self, text: &str) {
        let session = self.client.open_session(&self.token);
        let content = SlackMessageContent::new().with_text(text.to_string());
        let request = SlackApiChatUpdateRequest::new(self.channel_id.clone(), content, self.message_ts.clone());
        if let Err(e) = session.chat_update(&request).await {
            warn!(error = %e, "failed to edit Slack placeholder message");
        }
    }

    /// Edit the placeholder to its final rendered blocks, replacing the
    /// plain-text progress trail.
    pub async fn finalize(&self, fallback_text: &str, blocks: Vec<SlackBlock>) {
        let session = self.client.open_session(&self.token);
        let content = SlackMessageContent::new().with_text(fallback_text.to_string()).with_blocks(blocks);
        let request = SlackApiChatUpdateRequest::new(self.channel_id.clone(), content, self.message_ts.clone());
        if let Err(e) = session.chat_update(&request).await {
            warn!(error = %e, "failed to finalize Slack placeholder message");
        }
    }

    /// Edit the placeholder to an apology carrying the error summary, per
    /// spec.md §7's `InternalError` handling.
    pub async fn apologize(&self, error_summary: &str) {
        self.update_text(&format!("\u{26a0}\u{fe0f} Sorry, something went wrong: {error_summary}")).await;
    }
}

#[async_trait]
impl ProgressSink for SlackPlaceholder {
    async fn send(&self, message: String) {
        self.update_text(&message).await;
    }
}
