use std::sync::Arc;

use slack_morphism::prelude::*;
use tracing::{error, warn};

use crate::dispatch::{MentionInput, ReactionInput, ThreadMessageInput};
use crate::state::DispatcherState;

/// Start the Socket Mode event stream and block until it's told to stop.
/// Connection framing, heartbeats, and signature verification are the
/// crate's concern, not ours — we only supply callbacks.
pub async fn run(client: Arc<SlackHyperClient>, app_token: SlackApiToken, state: Arc<DispatcherState>) -> anyhow::Result<()> {
    let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(on_push_event);

    let listener_environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(client.clone())
            .with_error_handler(on_listener_error)
            .with_user_state(state),
    );

    let listener = SlackClientSocketModeListener::new(&SlackClientSocketModeConfig::new(), listener_environment, callbacks);
    listener.listen_for(&app_token).await?;
    listener.serve().await;
    Ok(())
}

async fn on_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(state) = states.read().await.get_user_state::<Arc<DispatcherState>>().cloned() else {
        warn!("socket-mode callback fired with no dispatcher state registered, ignoring");
        return Ok(());
    };

    match event.event {
        SlackEventCallbackBody::AppMention(ev) => {
            let input = MentionInput {
                channel: ev.channel.to_string(),
                ts: ev.origin.ts.to_string(),
                thread_ts: ev.origin.thread_ts.map(|ts| ts.to_string()),
                text: ev.content.text.unwrap_or_default(),
                user: ev.user.map(|u| u.to_string()).unwrap_or_default(),
            };
            if let Err(e) = crate::dispatch::on_app_mention(&state, input).await {
                warn!(error = %e, "failed to handle app_mention event");
            }
        }
        SlackEventCallbackBody::Message(ev) => {
            let is_bot = ev.sender.bot_id.is_some();
            let input = ThreadMessageInput {
                channel: ev.origin.channel.map(|c| c.to_string()).unwrap_or_default(),
                thread_ts: ev.origin.thread_ts.map(|ts| ts.to_string()),
                text: ev.content.and_then(|c| c.text).unwrap_or_default(),
                user: ev.sender.user.map(|u| u.to_string()).unwrap_or_default(),
                is_bot,
            };
            if let Err(e) = crate::dispatch::on_thread_message(&state, input).await {
                warn!(error = %e, "failed to handle thread message event");
            }
        }
        SlackEventCallbackBody::ReactionAdded(ev) => {
            if let SlackReactionsItem::Message(item) = ev.item {
                let input = ReactionInput {
                    channel: item.channel.to_string(),
                    message_ts: item.ts.to_string(),
                    reaction: ev.reaction.to_string(),
                };
                if let Err(e) = crate::dispatch::on_reaction_added(&state, input).await {
                    warn!(error = %e, "failed to handle reaction_added event");
                }
            }
        }
        SlackEventCallbackBody::AppHomeOpened(ev) => {
            if let Err(e) = crate::dispatch::on_home_opened(&state, &ev.user.to_string()).await {
                warn!(error = %e, "failed to handle app_home_opened event");
            }
        }
        _ => {}
    }

    Ok(())
}

fn on_listener_error(err: Box<dyn std::error::Error + Send + Sync>, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> http::StatusCode {
    error!(error = %err, "socket-mode listener error");
    http::StatusCode::OK
}
