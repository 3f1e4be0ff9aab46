//! Backend wire contract: payload types, response classification, and
//! argument formatting for human review.

pub mod classify;
pub mod format;
pub mod types;

pub use classify::{ShapeError, classify, parse_tool_call_response};
pub use format::{DisplayParam, format_arguments, humanize_tool_name};
pub use types::{
    ChatRequest, ConfirmRequest, ConversationResponse, ToolCall, ToolCallProposal, ToolHit,
    TranscriptMessage,
};
