//! Command orchestration state machine.
//!
//! [`CommandOrchestrator`] owns the whole interaction state ([`PaletteState`])
//! and never performs I/O itself. Transitions that need the backend return an
//! [`Outbound`] request tagged with a [`RequestTicket`]; whoever sends it
//! feeds the outcome back through [`CommandOrchestrator::resolve`]. Tickets
//! let late or superseded replies be recognized and dropped, which keeps the
//! "at most one pending confirmation" rule intact under any interleaving.

use std::fmt;

use serde_json::Value;

use crate::backend::ChatBackend;
use crate::confirmation::{ConfirmationSurface, ConfirmationView, EditError};
use crate::error::Result;
use crate::protocol::classify::classify;
use crate::protocol::format::escape_control_multiline;
use crate::protocol::types::{ChatRequest, ConfirmRequest, ConversationResponse};

/// Shown when a command request fails.
pub const COMMAND_FAILED_MESSAGE: &str = "Error processing command";
/// Shown when a confirm request fails.
pub const CONFIRM_FAILED_MESSAGE: &str = "Error confirming action";

/// Identifies one in-flight backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTicket {
    Command { seq: u64 },
    Confirm { seq: u64, tool_call_id: String },
}

/// Request body to send to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundRequest {
    Chat(ChatRequest),
    Confirm(ConfirmRequest),
}

/// A request produced by a state transition, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub ticket: RequestTicket,
    pub request: OutboundRequest,
}

impl Outbound {
    /// Send this request through `backend`.
    pub async fn dispatch(&self, backend: &dyn ChatBackend) -> Result<Value> {
        match &self.request {
            OutboundRequest::Chat(body) => backend.send_command(body).await,
            OutboundRequest::Confirm(body) => backend.confirm_tool_call(body).await,
        }
    }
}

/// Why a submit did not reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("command is empty")]
    Blank,
    #[error("a command is already being processed")]
    Busy,
    #[error("a tool call is waiting for confirmation")]
    AwaitingConfirmation,
}

/// Everything the palette shows, owned in one place.
#[derive(Debug, Clone, Default)]
pub struct PaletteState {
    input: String,
    response: Option<String>,
    surface: ConfirmationSurface,
    in_flight_command: Option<u64>,
    in_flight_confirm: Option<(u64, String)>,
    next_seq: u64,
}

impl PaletteState {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn surface(&self) -> &ConfirmationSurface {
        &self.surface
    }

    /// A command or confirm request is awaiting the backend.
    pub fn processing(&self) -> bool {
        self.in_flight_command.is_some() || self.in_flight_confirm.is_some()
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Drives submit/confirm/cancel over a [`PaletteState`].
#[derive(Debug, Clone, Default)]
pub struct CommandOrchestrator {
    state: PaletteState,
}

impl CommandOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PaletteState {
        &self.state
    }

    /// Update the input line. Typing is never blocked, even while processing.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.state.input = text.into();
    }

    /// Submit the current input line.
    pub fn submit_input(&mut self) -> std::result::Result<Outbound, SubmitRejection> {
        let text = std::mem::take(&mut self.state.input);
        let result = self.submit(&text);
        if result.is_err() {
            self.state.input = text;
        }
        result
    }

    /// Start a command request.
    pub fn submit(&mut self, text: &str) -> std::result::Result<Outbound, SubmitRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejection::Blank);
        }
        if self.state.in_flight_command.is_some() {
            return Err(SubmitRejection::Busy);
        }
        if !self.state.surface.is_idle() {
            return Err(SubmitRejection::AwaitingConfirmation);
        }

        let seq = self.state.next_seq();
        self.state.in_flight_command = Some(seq);
        tracing::info!(seq, "submitting command");
        Ok(Outbound {
            ticket: RequestTicket::Command { seq },
            request: OutboundRequest::Chat(ChatRequest::from_command(text)),
        })
    }

    /// Approve the open tool call. `None` if nothing is showing or a confirm
    /// is already in flight.
    pub fn confirm(&mut self) -> Option<Outbound> {
        let request = self.state.surface.begin_confirm()?;
        let seq = self.state.next_seq();
        let tool_call_id = request.tool_call.id.clone();
        self.state.in_flight_confirm = Some((seq, tool_call_id.clone()));
        tracing::info!(seq, %tool_call_id, "tool call confirmed by user");
        Some(Outbound {
            ticket: RequestTicket::Confirm { seq, tool_call_id },
            request: OutboundRequest::Confirm(request),
        })
    }

    /// Discard the open tool call. Purely local; returns whether anything was open.
    pub fn cancel(&mut self) -> bool {
        self.state.in_flight_confirm = None;
        self.state.surface.cancel().is_some()
    }

    /// Close the surface without choosing. Same as cancel.
    pub fn dismiss(&mut self) -> bool {
        self.state.in_flight_confirm = None;
        self.state.surface.dismiss().is_some()
    }

    /// Edit an argument of the open tool call before confirming.
    pub fn edit_argument(
        &mut self,
        path: &str,
        value: Value,
    ) -> std::result::Result<(), EditError> {
        self.state.surface.edit_argument(path, value)
    }

    /// Apply the backend's answer for `ticket`. Stale tickets are ignored.
    pub fn resolve(&mut self, ticket: RequestTicket, outcome: Result<Value>) {
        match ticket {
            RequestTicket::Command { seq } => self.resolve_command(seq, outcome),
            RequestTicket::Confirm { seq, tool_call_id } => {
                self.resolve_confirm(seq, &tool_call_id, outcome);
            }
        }
    }

    fn resolve_command(&mut self, seq: u64, outcome: Result<Value>) {
        if self.state.in_flight_command != Some(seq) {
            tracing::debug!(seq, "discarding stale command response");
            return;
        }
        self.state.in_flight_command = None;

        match outcome {
            Ok(raw) => self.apply_response(classify(&raw)),
            Err(e) => {
                tracing::warn!(seq, error = %e, "command request failed");
                self.state.response = Some(COMMAND_FAILED_MESSAGE.to_owned());
            }
        }
    }

    fn resolve_confirm(&mut self, seq: u64, tool_call_id: &str, outcome: Result<Value>) {
        let current = self
            .state
            .in_flight_confirm
            .as_ref()
            .is_some_and(|(s, id)| *s == seq && id == tool_call_id);
        if !current || !self.state.surface.finish_confirm(tool_call_id) {
            tracing::debug!(seq, %tool_call_id, "discarding stale confirm response");
            return;
        }
        self.state.in_flight_confirm = None;

        match outcome {
            Ok(raw) => self.apply_response(classify(&raw)),
            Err(e) => {
                tracing::warn!(seq, %tool_call_id, error = %e, "confirm request failed");
                self.state.response = Some(CONFIRM_FAILED_MESSAGE.to_owned());
            }
        }
    }

    fn apply_response(&mut self, response: ConversationResponse) {
        match response {
            ConversationResponse::Plain { text } => {
                if self.state.surface.is_idle() {
                    self.state.response = Some(text);
                } else {
                    tracing::debug!("plain response arrived while a confirmation is open");
                }
            }
            ConversationResponse::PendingToolCall(proposal) => {
                match self.state.surface.show(proposal) {
                    Ok(()) => self.state.response = None,
                    Err(rejected) => tracing::warn!(
                        tool_call_id = %rejected.tool_call.id,
                        "rejecting tool call while another is awaiting confirmation"
                    ),
                }
            }
        }
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> PaletteView {
        PaletteView {
            input: self.state.input.clone(),
            processing: self.state.processing(),
            response: self.state.response.clone(),
            confirmation: self.state.surface.view(),
        }
    }
}

/// Render-ready palette snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteView {
    pub input: String,
    pub processing: bool,
    pub response: Option<String>,
    pub confirmation: Option<ConfirmationView>,
}

impl fmt::Display for PaletteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.processing {
            writeln!(f, "Processing")?;
            writeln!(f, "  Loading...")?;
        }
        if let Some(response) = &self.response {
            writeln!(f, "Response")?;
            for line in escape_control_multiline(response).lines() {
                writeln!(f, "  {line}")?;
            }
        }
        if let Some(confirmation) = &self.confirmation {
            writeln!(f, "{confirmation}")?;
        }
        Ok(())
    }
}
