//! callgate: a command palette that puts a human in front of backend tool calls.
//!
//! Commands (typed or spoken) go to a conversational backend. When the
//! backend answers with a tool call that needs verification, the call is held
//! on a confirmation surface until the user confirms or cancels it.
//!
//! # Architecture
//!
//! - **protocol**: wire types, response classification, argument formatting
//! - **confirmation**: the single-slot confirmation surface
//! - **orchestrator**: owned interaction state and request tickets
//! - **backend**: HTTP client for the chat endpoint
//! - **voice**: microphone capture via `cpal` and remote transcription
//! - **runtime**: event loop connecting front-end, backend and voice
//! - **terminal**: stdin/stdout front-end

pub mod backend;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod runtime;
pub mod terminal;
pub mod voice;

pub use backend::{ChatBackend, HttpChatBackend};
pub use config::CallgateConfig;
pub use confirmation::{ConfirmationSurface, ConfirmationView, PendingConfirmation};
pub use error::{GateError, Result};
pub use orchestrator::{CommandOrchestrator, PaletteState, PaletteView};
pub use runtime::{PaletteCommand, PaletteHandle, PaletteRuntime, PaletteSnapshot};
