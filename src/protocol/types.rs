//! Wire types exchanged with the conversational backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback shown when a plain response carries no readable text.
pub const NO_RESPONSE_CONTENT: &str = "No response content";

/// A backend proposal to invoke a named capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Proposal identifier, echoed back verbatim on confirmation.
    pub id: String,
    pub tool_name: String,
    /// Arguments in the order the backend sent them.
    pub arguments: Map<String, Value>,
    /// Integration that will execute the tool, when the backend names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
}

/// Opaque tool routing context relayed back to the backend on confirm.
pub type ToolHit = Map<String, Value>;

/// One entry of the message transcript attached to a tool-call response.
///
/// Unknown keys are kept in `extra` so the transcript is echoed back intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TranscriptMessage {
    /// `{content, role}` chat message.
    Basic {
        content: String,
        role: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// Full assistant message as produced by an OpenAI-style completion.
    Extended {
        content: Option<String>,
        role: String,
        refusal: Value,
        audio: Value,
        function_call: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<Value>>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl TranscriptMessage {
    pub fn role(&self) -> &str {
        match self {
            Self::Basic { role, .. } | Self::Extended { role, .. } => role,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Basic { content, .. } => Some(content),
            Self::Extended { content, .. } => content.as_deref(),
        }
    }
}

/// A tool call awaiting human confirmation, with everything needed to resume.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallProposal {
    pub tool_call: ToolCall,
    pub tool_hit: ToolHit,
    pub messages: Vec<TranscriptMessage>,
}

/// Classified backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationResponse {
    /// Ordinary conversational reply.
    Plain { text: String },
    /// The backend wants to run a tool and needs approval first.
    PendingToolCall(ToolCallProposal),
}

/// User message inside a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandMessage {
    pub content: String,
}

/// Body of `POST <chat_url>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<CommandMessage>,
}

impl ChatRequest {
    /// Wrap a single utterance.
    pub fn from_command(text: impl Into<String>) -> Self {
        Self {
            messages: vec![CommandMessage {
                content: text.into(),
            }],
        }
    }
}

/// Body of `POST <chat_url>/confirm-tool-call`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmRequest {
    pub tool_call: ToolCall,
    pub tool_hit: ToolHit,
    pub updated_arguments: Map<String, Value>,
    pub messages: Vec<TranscriptMessage>,
}
