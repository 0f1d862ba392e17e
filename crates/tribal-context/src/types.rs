use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool call requested by the model inside an `Assistant` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments, exactly as the model emitted them.
    pub arguments: String,
}

/// A single turn in a thread's conversation log.
///
/// Modeled as a tagged variant rather than a flat struct with optional
/// fields free-floating: `Tool` always carries a `tool_call_id`, `Assistant`
/// may carry `tool_calls`, and neither `System` nor `User` carry either.
/// Wire (de)serialization goes through [`MessageWire`], which matches the
/// flat shape the LLM API and the SQLite JSON column both expect, omitting
/// fields that don't apply to a given role.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System {
        content: String,
        timestamp: String,
    },
    User {
        content: String,
        timestamp: String,
        user_id: Option<String>,
    },
    Assistant {
        content: String,
        timestamp: String,
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        content: String,
        timestamp: String,
        tool_call_id: String,
    },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content, .. }
            | Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Message::System { timestamp, .. }
            | Message::User { timestamp, .. }
            | Message::Assistant { timestamp, .. }
            | Message::Tool { timestamp, .. } => timestamp,
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Message::Assistant {
                tool_calls: Some(calls),
                ..
            } => Some(calls),
            _ => None,
        }
    }
}

/// Flat wire shape: `{role, content, timestamp, user_id?, tool_calls?, tool_call_id?}`.
/// Absent optional fields are skipped on serialization, matching the
/// conditional dict-building the original Python store used.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageWire {
    role: String,
    content: String,
    #[serde(default)]
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_call_id: Option<String>,
}

impl From<&Message> for MessageWire {
    fn from(m: &Message) -> Self {
        match m {
            Message::System { content, timestamp } => MessageWire {
                role: "system".to_string(),
                content: content.clone(),
                timestamp: timestamp.clone(),
                user_id: None,
                tool_calls: None,
                tool_call_id: None,
            },
            Message::User {
                content,
                timestamp,
                user_id,
            } => MessageWire {
                role: "user".to_string(),
                content: content.clone(),
                timestamp: timestamp.clone(),
                user_id: user_id.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            Message::Assistant {
                content,
                timestamp,
                tool_calls,
            } => MessageWire {
                role: "assistant".to_string(),
                content: content.clone(),
                timestamp: timestamp.clone(),
                user_id: None,
                tool_calls: tool_calls.clone(),
                tool_call_id: None,
            },
            Message::Tool {
                content,
                timestamp,
                tool_call_id,
            } => MessageWire {
                role: "tool".to_string(),
                content: content.clone(),
                timestamp: timestamp.clone(),
                user_id: None,
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            },
        }
    }
}

impl From<MessageWire> for Message {
    fn from(w: MessageWire) -> Self {
        match w.role.as_str() {
            "system" => Message::System {
                content: w.content,
                timestamp: w.timestamp,
            },
            "assistant" => Message::Assistant {
                content: w.content,
                timestamp: w.timestamp,
                tool_calls: w.tool_calls,
            },
            "tool" => Message::Tool {
                content: w.content,
                timestamp: w.timestamp,
                tool_call_id: w.tool_call_id.unwrap_or_default(),
            },
            _ => Message::User {
                content: w.content,
                timestamp: w.timestamp,
                user_id: w.user_id,
            },
        }
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        MessageWire::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        MessageWire::deserialize(deserializer).map(Message::from)
    }
}

/// A flattened message ready to hand to the LLM API: `role`, `content`, and
/// — when present — `tool_calls` / `tool_call_id`.
#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Conversation state for one Slack thread. Identity is
/// `(channel_id, thread_ts)`; `thread_key` is the storage key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadContext {
    pub channel_id: String,
    pub thread_ts: String,
    pub user_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl ThreadContext {
    pub fn thread_key(&self) -> String {
        format!("{}:{}", self.channel_id, self.thread_ts)
    }

    pub fn new(channel_id: impl Into<String>, thread_ts: impl Into<String>, user_id: impl Into<String>, now: &str) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: thread_ts.into(),
            user_id: user_id.into(),
            messages: Vec::new(),
            metadata: HashMap::new(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    pub fn add_user_message(&mut self, content: impl Into<String>, user_id: Option<String>, now: &str) {
        self.messages.push(Message::User {
            content: content.into(),
            timestamp: now.to_string(),
            user_id: user_id.or_else(|| Some(self.user_id.clone())),
        });
        self.updated_at = now.to_string();
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>, now: &str) {
        self.messages.push(Message::Assistant {
            content: content.into(),
            timestamp: now.to_string(),
            tool_calls,
        });
        self.updated_at = now.to_string();
    }

    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>, now: &str) {
        self.messages.push(Message::Tool {
            content: content.into(),
            timestamp: now.to_string(),
            tool_call_id: tool_call_id.into(),
        });
        self.updated_at = now.to_string();
    }

    /// Trailing window of messages flattened for the LLM call. The tail
    /// bound caps token growth; older messages are dropped but not deleted
    /// from storage. If the naive cut point lands inside a tool-result run
    /// that follows an `Assistant{tool_calls}` message, `start` is walked
    /// backward to that assistant message so no `Tool` message ever enters
    /// the window without the `assistant` entry its `tool_call_id` pairs
    /// against — tool results are always appended immediately after their
    /// owning assistant message, so walking back over consecutive `Tool`
    /// entries always lands on it.
    pub fn get_messages_for_llm(&self, max_messages: usize) -> Vec<LlmMessage> {
        let mut start = self.messages.len().saturating_sub(max_messages);
        while start > 0 && matches!(self.messages[start], Message::Tool { .. }) {
            start -= 1;
        }
        self.messages[start..]
            .iter()
            .map(|m| LlmMessage {
                role: m.role().to_string(),
                content: m.content().to_string(),
                tool_calls: m.tool_calls().map(|c| c.to_vec()),
                tool_call_id: m.tool_call_id().map(|s| s.to_string()),
            })
            .collect()
    }
}
