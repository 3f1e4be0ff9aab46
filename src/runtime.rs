//! Event loop wiring the palette together.
//!
//! [`PaletteRuntime::run`] is the single place where state changes happen.
//! It multiplexes three inputs:
//!
//! 1. **Commands** from the front-end ([`PaletteCommand`] over an mpsc channel).
//! 2. **Backend completions** from spawned request tasks, keyed by ticket.
//! 3. **Voice events** from the [`VoiceCaptureAdapter`].
//!
//! After each event the current [`PaletteSnapshot`] is published on a watch
//! channel. Backend calls and microphone work never run on the loop itself,
//! so confirm and cancel stay responsive while either is pending.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::error::{GateError, Result};
use crate::orchestrator::{
    CommandOrchestrator, Outbound, PaletteView, RequestTicket, SubmitRejection,
};
use crate::voice::{VoiceCaptureAdapter, VoiceEvent};

/// Command channel capacity.
const COMMAND_CAPACITY: usize = 64;

/// Shown when a transcription fails.
pub const TRANSCRIPTION_FAILED_MESSAGE: &str = "There was an error transcribing your audio";

/// Front-end requests.
#[derive(Debug, Clone, PartialEq)]
pub enum PaletteCommand {
    /// Replace the input line.
    Input(String),
    /// Submit the current input line.
    Submit,
    /// Replace the input line and submit it.
    SubmitText(String),
    Confirm,
    Cancel,
    /// Escape / window close.
    Dismiss,
    EditArgument { path: String, value: Value },
    ToggleVoice,
    SetRecording(bool),
    Shutdown,
}

/// Everything a front-end needs to draw the palette.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteSnapshot {
    pub view: PaletteView,
    pub recording: bool,
    /// Transient status line (rejections, microphone or transcription problems).
    pub notice: Option<String>,
}

impl fmt::Display for PaletteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.recording {
            writeln!(f, "(recording... /voice to stop)")?;
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "! {notice}")?;
        }
        write!(f, "{}", self.view)
    }
}

/// Client side of a running palette.
#[derive(Debug, Clone)]
pub struct PaletteHandle {
    commands: mpsc::Sender<PaletteCommand>,
    snapshots: watch::Receiver<PaletteSnapshot>,
}

impl PaletteHandle {
    /// Queue a command for the event loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime has shut down.
    pub async fn send(&self, command: PaletteCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GateError::Channel("palette runtime has stopped".into()))
    }

    pub fn snapshot(&self) -> PaletteSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaletteSnapshot> {
        self.snapshots.clone()
    }
}

type Completion = (RequestTicket, Result<Value>);

pub struct PaletteRuntime {
    orchestrator: CommandOrchestrator,
    backend: Arc<dyn ChatBackend>,
    voice: Option<VoiceCaptureAdapter>,
    voice_rx: Option<mpsc::UnboundedReceiver<VoiceEvent>>,
    commands_rx: mpsc::Receiver<PaletteCommand>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshots_tx: watch::Sender<PaletteSnapshot>,
    notice: Option<String>,
}

impl PaletteRuntime {
    pub fn new(backend: Arc<dyn ChatBackend>) -> (Self, PaletteHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(PaletteSnapshot::default());
        (
            Self {
                orchestrator: CommandOrchestrator::new(),
                backend,
                voice: None,
                voice_rx: None,
                commands_rx,
                completions_tx,
                completions_rx,
                snapshots_tx,
                notice: None,
            },
            PaletteHandle {
                commands: commands_tx,
                snapshots: snapshots_rx,
            },
        )
    }

    /// Attach voice input.
    pub fn with_voice(
        mut self,
        adapter: VoiceCaptureAdapter,
        events: mpsc::UnboundedReceiver<VoiceEvent>,
    ) -> Self {
        self.voice = Some(adapter);
        self.voice_rx = Some(events);
        self
    }

    /// Run until shutdown is requested, every handle is dropped, or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("palette runtime started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                command = self.commands_rx.recv() => match command {
                    None | Some(PaletteCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some((ticket, outcome)) = self.completions_rx.recv() => {
                    self.orchestrator.resolve(ticket, outcome);
                }
                Some(event) = next_voice_event(&mut self.voice_rx) => {
                    self.handle_voice_event(event);
                }
            }
            self.publish();
        }

        if let Some(voice) = &self.voice {
            voice.set_recording(false);
        }
        info!("palette runtime stopped");
    }

    fn handle_command(&mut self, command: PaletteCommand) {
        debug!(?command, "palette command");
        self.notice = None;
        match command {
            PaletteCommand::Input(text) => self.orchestrator.set_input(text),
            PaletteCommand::Submit => self.submit_input(),
            PaletteCommand::SubmitText(text) => {
                self.orchestrator.set_input(text);
                self.submit_input();
            }
            PaletteCommand::Confirm => {
                if let Some(outbound) = self.orchestrator.confirm() {
                    self.dispatch(outbound);
                }
            }
            PaletteCommand::Cancel => {
                self.orchestrator.cancel();
            }
            PaletteCommand::Dismiss => {
                self.orchestrator.dismiss();
            }
            PaletteCommand::EditArgument { path, value } => {
                if let Err(e) = self.orchestrator.edit_argument(&path, value) {
                    self.notice = Some(e.to_string());
                }
            }
            PaletteCommand::ToggleVoice => match &self.voice {
                Some(voice) => voice.toggle(),
                None => self.notice = Some("voice input is not configured".into()),
            },
            PaletteCommand::SetRecording(on) => match &self.voice {
                Some(voice) => voice.set_recording(on),
                None => self.notice = Some("voice input is not configured".into()),
            },
            PaletteCommand::Shutdown => {}
        }
    }

    fn handle_voice_event(&mut self, event: VoiceEvent) {
        debug!(?event, "voice event");
        match event {
            VoiceEvent::RecordingStarted | VoiceEvent::RecordingStopped => {}
            VoiceEvent::MicrophoneDenied(reason) => {
                self.notice = Some(format!("Microphone unavailable: {reason}"));
            }
            VoiceEvent::EmptyRecording => {
                self.notice = Some("No audio captured".into());
            }
            VoiceEvent::Transcribed(text) => {
                info!(chars = text.len(), "submitting transcribed command");
                self.notice = None;
                self.orchestrator.set_input(text);
                self.submit_input();
            }
            VoiceEvent::TranscriptionFailed(_) => {
                self.notice = Some(TRANSCRIPTION_FAILED_MESSAGE.into());
            }
        }
    }

    fn submit_input(&mut self) {
        match self.orchestrator.submit_input() {
            Ok(outbound) => self.dispatch(outbound),
            Err(SubmitRejection::Blank) => {}
            Err(rejection) => {
                warn!(%rejection, "submit rejected");
                self.notice = Some(rejection.to_string());
            }
        }
    }

    fn dispatch(&self, outbound: Outbound) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = outbound.dispatch(backend.as_ref()).await;
            if completions.send((outbound.ticket, outcome)).is_err() {
                debug!("runtime stopped before backend replied");
            }
        });
    }

    fn publish(&self) {
        let next = PaletteSnapshot {
            view: self.orchestrator.view(),
            recording: self.voice.as_ref().is_some_and(VoiceCaptureAdapter::is_recording),
            notice: self.notice.clone(),
        };
        self.snapshots_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn next_voice_event(
    rx: &mut Option<mpsc::UnboundedReceiver<VoiceEvent>>,
) -> Option<VoiceEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
