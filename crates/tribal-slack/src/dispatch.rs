use std::sync::Arc;

use slack_morphism::prelude::*;
use tracing::{error, info, warn};

use crate::error::{Result, SlackError};
use crate::home::{build_home_view, HomeViewData};
use crate::index::IndexedAnswer;
use crate::mention::{is_emoji_only_short_token, strip_mention};
use crate::placeholder::SlackPlaceholder;
use crate::render::render;
use crate::state::DispatcherState;

/// Emoji reactions the bot treats specially on its own messages.
const APPROVAL_REACTION: &str = "package";
const REFRESH_REACTION: &str = "arrows_counterclockwise";
const CONFIRMATION_REACTION: &str = "white_check_mark";

/// Plain projection of an `app_mention` event — decoupled from
/// `slack-morphism`'s event type so the dispatch logic below is testable
/// without constructing one.
pub struct MentionInput {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub text: String,
    pub user: String,
}

pub async fn on_app_mention(state: &Arc<DispatcherState>, event: MentionInput) -> Result<()> {
    let stripped = strip_mention(&event.text, &state.bot_user_id);
    if stripped.is_empty() {
        post_plain(state, &event.channel, &event.ts, "Mention me with a question about the database and I'll take a look!").await?;
        return Ok(());
    }

    let thread_ts = event.thread_ts.unwrap_or_else(|| event.ts.clone());
    dispatch_turn(state.clone(), event.channel, thread_ts, Some(event.user), stripped);
    Ok(())
}

/// Plain projection of a thread `message` event.
pub struct ThreadMessageInput {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub text: String,
    pub user: String,
    pub is_bot: bool,
}

pub async fn on_thread_message(state: &Arc<DispatcherState>, event: ThreadMessageInput) -> Result<()> {
    if event.is_bot {
        return Ok(());
    }
    let Some(thread_ts) = event.thread_ts else {
        return Ok(());
    };

    match state.contexts.get(&event.channel, &thread_ts) {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!(error = %e, channel = %event.channel, %thread_ts, "failed to look up thread context");
            return Err(SlackError::Context(e));
        }
    }

    let stripped = strip_mention(&event.text, &state.bot_user_id);
    if stripped.is_empty() || is_emoji_only_short_token(&stripped) {
        return Ok(());
    }

    dispatch_turn(state.clone(), event.channel, thread_ts, Some(event.user), stripped);
    Ok(())
}

/// Plain projection of a `reaction_added` event targeting a message the
/// bot posted.
pub struct ReactionInput {
    pub channel: String,
    pub message_ts: String,
    pub reaction: String,
}

pub async fn on_reaction_added(state: &Arc<DispatcherState>, event: ReactionInput) -> Result<()> {
    let Some(indexed) = state.index.lookup(&event.channel, &event.message_ts) else {
        return Ok(());
    };

    if event.reaction == APPROVAL_REACTION {
        if !indexed.result.from_cache && !indexed.result.tools_used.is_empty() {
            if let Some(cache) = &state.cache {
                cache.save(
                    &indexed.question,
                    &indexed.result.response_text,
                    &indexed.result.tools_used,
                    &indexed.result.sql_queries,
                    &indexed.result.progress_events,
                )?;
                add_reaction(state, &event.channel, &event.message_ts, CONFIRMATION_REACTION).await;
            }
        }
        return Ok(());
    }

    if event.reaction == REFRESH_REACTION {
        if let Some(cache) = &state.cache {
            cache.delete_by_question(&indexed.question)?;
        }
        post_plain(state, &event.channel, &indexed.thread_ts, "\u{1f504} Running a fresh query\u{2026}").await?;
        dispatch_turn(state.clone(), event.channel, indexed.thread_ts.clone(), None, indexed.question.clone());
    }

    Ok(())
}

pub async fn on_home_opened(state: &Arc<DispatcherState>, user_id: &str) -> Result<()> {
    let mcp_status = state.mcp.test_connectivity().await;
    let context_stats = state.contexts.get_stats()?;
    let cache_stats = match &state.cache {
        Some(cache) => cache.get_stats()?,
        None => Default::default(),
    };

    let view = build_home_view(&HomeViewData {
        mcp_status: &mcp_status,
        llm_primary_model: &state.llm_primary_model,
        llm_fallback: state.llm_fallback_status.clone(),
        context_stats,
        cache_stats,
        cache_enabled: state.cache_enabled,
    });

    let session = state.client.open_session(&state.token);
    let request = SlackApiViewsPublishRequest::new(SlackUserId(user_id.to_string()), SlackView::Home(view));
    if let Err(e) = session.views_publish(&request).await {
        error!(error = %e, %user_id, "failed to publish Slack home view");
    }
    Ok(())
}

/// Post a "thinking" placeholder, run the agent loop against it as the
/// progress sink, then finalize it with the rendered answer — detached
/// from the event-acknowledgement path per spec.md §4.6's ack-deadline
/// note. Exceptions are caught and turned into an apology edit rather than
/// propagated, so one bad turn never takes down the socket-mode listener.
fn dispatch_turn(state: Arc<DispatcherState>, channel: String, thread_ts: String, user_id: Option<String>, question: String) {
    tokio::spawn(async move {
        if let Err(e) = run_turn(&state, &channel, &thread_ts, user_id.as_deref(), &question).await {
            warn!(error = %e, %channel, %thread_ts, "agent turn failed");
        }
    });
}

async fn run_turn(state: &Arc<DispatcherState>, channel: &str, thread_ts: &str, user_id: Option<&str>, question: &str) -> Result<()> {
    let session = state.client.open_session(&state.token);
    let placeholder_content = SlackMessageContent::new().with_text("\u{1f914} *Working on it...*".to_string());
    let post_request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel.to_string()), placeholder_content).with_thread_ts(SlackTs(thread_ts.to_string()));

    let posted = session.chat_post_message(&post_request).await.map_err(|e| SlackError::Api(e.to_string()))?;
    let placeholder = SlackPlaceholder::new(state.client.clone(), state.token.clone(), SlackChannelId(channel.to_string()), posted.ts.clone());

    let thread_key = format!("{channel}:{thread_ts}");
    let mut context = match state.contexts.get_or_create(channel, thread_ts, user_id.unwrap_or("unknown")) {
        Ok(context) => context,
        Err(e) => {
            warn!(error = %e, %thread_key, "failed to load thread context, apologizing instead of leaving the placeholder stuck");
            placeholder.apologize(&e.to_string()).await;
            return Ok(());
        }
    };

    let result = state.agent.process_message(&mut context, question, user_id, &placeholder).await;

    if let Err(e) = state.contexts.save(&mut context) {
        warn!(error = %e, %thread_key, "failed to persist thread context after agent turn");
    }

    if let Some(error_summary) = &result.error {
        placeholder.apologize(error_summary).await;
        return Ok(());
    }

    let (fallback_text, blocks) = render(&result);
    placeholder.finalize(&fallback_text, blocks).await;

    state.index.record(
        channel.to_string(),
        posted.ts.to_string(),
        IndexedAnswer { question: question.to_string(), result, thread_ts: thread_ts.to_string() },
    );

    Ok(())
}

async fn post_plain(state: &Arc<DispatcherState>, channel: &str, thread_ts: &str, text: &str) -> Result<()> {
    let session = state.client.open_session(&state.token);
    let content = SlackMessageContent::new().with_text(text.to_string());
    let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel.to_string()), content).with_thread_ts(SlackTs(thread_ts.to_string()));
    session.chat_post_message(&request).await.map_err(|e| SlackError::Api(e.to_string()))?;
    Ok(())
}

async fn add_reaction(state: &Arc<DispatcherState>, channel: &str, message_ts: &str, reaction: &str) {
    let session = state.client.open_session(&state.token);
    let request = SlackApiReactionsAddRequest::new(SlackChannelId(channel.to_string()), SlackReactionName(reaction.to_string()), SlackTs(message_ts.to_string()));
    if let Err(e) = session.reactions_add(&request).await {
        warn!(error = %e, %channel, %message_ts, "failed to add confirmation reaction");
    }
}
