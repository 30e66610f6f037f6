//! Messages streamed back from the agent.

use agentkit_core::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in the response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
    System(SystemMessage),
    Result(ResultMessage),
    StreamEvent(StreamEvent),
}

impl Message {
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Text blocks of an assistant message, joined by newlines.
    pub fn assistant_text(&self) -> Option<String> {
        match self {
            Self::Assistant(message) => Some(message.text()).filter(|text| !text.is_empty()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub message: UserContent,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContent {
    #[serde(default)]
    pub role: Option<String>,
    pub content: UserContentBody,
}

/// A user turn is either plain text or tool results fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContentBody {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
}

impl AssistantMessage {
    pub fn content(&self) -> &[ContentBlock] {
        &self.message.content
    }

    pub fn model(&self) -> Option<&str> {
        self.message.model.as_deref()
    }

    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.message.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantContent {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Content block inside a user or assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Session metadata (`init` and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub subtype: String,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

/// Final message of a response, carrying cost and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub duration_api_ms: u64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub structured_output: Option<Value>,
}

/// Partial-message event, only emitted when partial streaming is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub session_id: String,
    pub event: Value,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
}

const MESSAGE_TYPES: &[&str] = &["user", "assistant", "system", "result", "stream_event"];

/// Decode one line of CLI output. Unknown message types yield `None`.
pub fn parse_message(value: Value) -> AgentResult<Option<Message>> {
    let Some(message_type) = value.get("type").and_then(Value::as_str) else {
        return Err(AgentError::Protocol(format!(
            "message without a type field: {}",
            value
        )));
    };

    if !MESSAGE_TYPES.contains(&message_type) {
        tracing::debug!(message_type, "Skipping unknown message type");
        return Ok(None);
    }

    Message::deserialize(&value)
        .map(Some)
        .map_err(|e| AgentError::Protocol(format!("malformed {} message: {}", message_type, e)))
}
