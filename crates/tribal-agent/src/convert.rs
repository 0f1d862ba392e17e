use tribal_context::{LlmMessage, ToolCall as ContextToolCall};
use tribal_llm::{ChatMessage, ToolCall as LlmToolCall};

/// [`tribal_context::LlmMessage`] and [`tribal_llm::ChatMessage`] carry the
/// same flat wire shape (`role`, `content`, optional `tool_calls` /
/// `tool_call_id`) but live in different crates with no dependency between
/// them, so the agent loop converts explicitly rather than adding a cycle.
pub fn to_chat_message(message: LlmMessage) -> ChatMessage {
    ChatMessage {
        role: message.role,
        content: message.content,
        tool_calls: message.tool_calls.map(|calls| calls.into_iter().map(to_llm_tool_call).collect()),
        tool_call_id: message.tool_call_id,
    }
}

pub fn to_llm_tool_call(call: ContextToolCall) -> LlmToolCall {
    LlmToolCall { id: call.id, name: call.name, arguments: call.arguments }
}

pub fn to_context_tool_call(call: &LlmToolCall) -> ContextToolCall {
    ContextToolCall { id: call.id.clone(), name: call.name.clone(), arguments: call.arguments.clone() }
}

pub fn system_message(content: String) -> ChatMessage {
    ChatMessage { role: "system".to_string(), content, tool_calls: None, tool_call_id: None }
}
