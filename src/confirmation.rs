//! Confirmation surface for backend tool calls.
//!
//! A proposal moves `Idle -> Showing -> Confirming -> Idle`, or leaves
//! `Showing`/`Confirming` through [`ConfirmationSurface::cancel`]. Those two
//! affordances are the only exits; dismissing the surface is a cancel.
//! Only one proposal can be on the surface at a time.

use std::fmt;

use serde_json::{Map, Value};

use crate::protocol::format::{DisplayParam, escape_control, format_arguments, humanize_tool_name};
use crate::protocol::types::{ConfirmRequest, ToolCallProposal};

/// Heading shown above every proposal.
pub const CONFIRM_TITLE: &str = "Confirm Action";

/// A proposal waiting for the human, plus any edits made to its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    proposal: ToolCallProposal,
    arguments: Map<String, Value>,
}

impl PendingConfirmation {
    pub fn new(proposal: ToolCallProposal) -> Self {
        let arguments = proposal.tool_call.arguments.clone();
        Self {
            proposal,
            arguments,
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.proposal.tool_call.id
    }

    pub fn proposal(&self) -> &ToolCallProposal {
        &self.proposal
    }

    /// Arguments that will be sent on confirm (edited copy).
    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    fn confirm_request(&self) -> ConfirmRequest {
        ConfirmRequest {
            tool_call: self.proposal.tool_call.clone(),
            tool_hit: self.proposal.tool_hit.clone(),
            updated_arguments: self.arguments.clone(),
            messages: self.proposal.messages.clone(),
        }
    }

    fn set_argument(&mut self, path: &str, value: Value) -> Result<(), EditError> {
        let keys: Vec<&str> = path.split('.').collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(EditError::InvalidPath(path.to_owned()));
        }
        let Some((leaf, parents)) = keys.split_last() else {
            return Err(EditError::InvalidPath(path.to_owned()));
        };

        let mut node = &mut self.arguments;
        for key in parents {
            node = node
                .get_mut(*key)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| EditError::InvalidPath(path.to_owned()))?;
        }
        node.insert((*leaf).to_owned(), value);
        Ok(())
    }
}

/// Surface state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SurfaceState {
    #[default]
    Idle,
    Showing(PendingConfirmation),
    /// Confirm request in flight; input is disabled.
    Confirming(PendingConfirmation),
}

/// Argument edit rejected by the surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("no proposal is open for editing")]
    NotEditable,
    #[error("argument path '{0}' does not name an editable field")]
    InvalidPath(String),
}

/// Holds at most one pending confirmation.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationSurface {
    state: SurfaceState,
}

impl ConfirmationSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SurfaceState::Idle)
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self.state, SurfaceState::Confirming(_))
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.state {
            SurfaceState::Idle => None,
            SurfaceState::Showing(p) | SurfaceState::Confirming(p) => Some(p),
        }
    }

    /// Put a proposal on the surface.
    ///
    /// Hands the proposal back if another one is still unresolved.
    pub fn show(&mut self, proposal: ToolCallProposal) -> Result<(), Box<ToolCallProposal>> {
        if !self.is_idle() {
            return Err(Box::new(proposal));
        }
        tracing::debug!(
            tool_call_id = %proposal.tool_call.id,
            tool = %proposal.tool_call.tool_name,
            "showing tool call for confirmation"
        );
        self.state = SurfaceState::Showing(PendingConfirmation::new(proposal));
        Ok(())
    }

    /// Replace one argument before confirming. `path` is dot-separated.
    pub fn edit_argument(&mut self, path: &str, value: Value) -> Result<(), EditError> {
        match &mut self.state {
            SurfaceState::Showing(pending) => pending.set_argument(path, value),
            _ => Err(EditError::NotEditable),
        }
    }

    /// `Showing -> Confirming`. Returns the request to send, or `None` when
    /// there is nothing to confirm or a confirm is already in flight.
    pub fn begin_confirm(&mut self) -> Option<ConfirmRequest> {
        match std::mem::take(&mut self.state) {
            SurfaceState::Showing(pending) => {
                let request = pending.confirm_request();
                self.state = SurfaceState::Confirming(pending);
                Some(request)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Clear the surface once the backend answered the confirm for
    /// `tool_call_id`, whatever the outcome. Returns `false` for a stale id.
    pub fn finish_confirm(&mut self, tool_call_id: &str) -> bool {
        match &self.state {
            SurfaceState::Confirming(p) if p.tool_call_id() == tool_call_id => {
                self.state = SurfaceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Discard the open proposal without contacting the backend.
    pub fn cancel(&mut self) -> Option<PendingConfirmation> {
        match std::mem::take(&mut self.state) {
            SurfaceState::Idle => None,
            SurfaceState::Showing(p) | SurfaceState::Confirming(p) => {
                tracing::info!(tool_call_id = %p.tool_call_id(), "tool call cancelled");
                Some(p)
            }
        }
    }

    /// Escape / window close. Never approves.
    pub fn dismiss(&mut self) -> Option<PendingConfirmation> {
        self.cancel()
    }

    pub fn view(&self) -> Option<ConfirmationView> {
        let (pending, busy) = match &self.state {
            SurfaceState::Idle => return None,
            SurfaceState::Showing(p) => (p, false),
            SurfaceState::Confirming(p) => (p, true),
        };
        let call = &pending.proposal.tool_call;
        Some(ConfirmationView {
            title: CONFIRM_TITLE.to_owned(),
            tool: humanize_tool_name(&call.tool_name),
            api_name: call.api_name.clone(),
            params: format_arguments(&pending.arguments),
            actions: vec![
                SurfaceAction {
                    kind: ActionKind::Cancel,
                    enabled: true,
                },
                SurfaceAction {
                    kind: ActionKind::Confirm,
                    enabled: !busy,
                },
            ],
            busy,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Confirm,
    Cancel,
}

impl ActionKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Confirm => "Confirm",
            Self::Cancel => "Cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceAction {
    pub kind: ActionKind,
    pub enabled: bool,
}

/// Render-ready snapshot of the open proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationView {
    pub title: String,
    pub tool: String,
    pub api_name: Option<String>,
    pub params: Vec<DisplayParam>,
    pub actions: Vec<SurfaceAction>,
    pub busy: bool,
}

impl fmt::Display for ConfirmationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        let tool = escape_control(&self.tool);
        match &self.api_name {
            Some(api) => writeln!(f, "  {tool} via {}", escape_control(api))?,
            None => writeln!(f, "  {tool}")?,
        }
        for param in &self.params {
            writeln!(
                f,
                "    {}: {}",
                escape_control(&param.label),
                escape_control(&param.value)
            )?;
        }
        let actions: Vec<String> = self
            .actions
            .iter()
            .map(|a| match (a.kind, a.enabled) {
                (ActionKind::Confirm, false) if self.busy => "[Confirming...]".to_owned(),
                (kind, true) => format!("[{}]", kind.label()),
                (kind, false) => format!("({})", kind.label()),
            })
            .collect();
        write!(f, "  {}", actions.join("  "))
    }
}
