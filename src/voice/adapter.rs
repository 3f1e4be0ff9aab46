//! Push-to-talk adapter between the microphone and the palette.
//!
//! Recording is toggled from outside. Opening the device, finalizing the clip
//! and transcribing it all happen on background tasks, so toggling returns
//! immediately and the caller's event loop keeps running while an OS
//! permission prompt or a capture thread join is pending. Results travel to
//! the palette as [`VoiceEvent`]s over a channel.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::voice::capture::{AudioSource, RecordingSession};
use crate::voice::transcribe::Transcriber;

/// What the adapter reports to the palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    RecordingStarted,
    RecordingStopped,
    /// Microphone could not be opened; recording stays off.
    MicrophoneDenied(String),
    /// Recording stopped with no audio; nothing was sent for transcription.
    EmptyRecording,
    /// Transcribed text, to be submitted as a command.
    Transcribed(String),
    TranscriptionFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Stopped,
    /// Waiting for the device to open.
    Starting,
    Recording,
    /// Session is being finalized; a new one cannot start yet.
    Stopping,
}

struct Slot {
    state: RecordingState,
    session: Option<Box<dyn RecordingSession>>,
    /// Stop was requested while the device was still opening.
    stop_requested: bool,
}

struct Shared {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    slot: Mutex<Slot>,
    events: mpsc::UnboundedSender<VoiceEvent>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: VoiceEvent) {
        if self.events.send(event).is_err() {
            debug!("voice event receiver dropped");
        }
    }
}

pub struct VoiceCaptureAdapter {
    shared: Arc<Shared>,
}

impl VoiceCaptureAdapter {
    /// Create an adapter and the receiver its events arrive on.
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            source,
            transcriber,
            slot: Mutex::new(Slot {
                state: RecordingState::Stopped,
                session: None,
                stop_requested: false,
            }),
            events,
        });
        (Self { shared }, rx)
    }

    pub fn state(&self) -> RecordingState {
        self.shared.slot().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Start when stopped, stop when recording or opening.
    pub fn toggle(&self) {
        let next = matches!(
            self.state(),
            RecordingState::Stopped | RecordingState::Stopping
        );
        self.set_recording(next);
    }

    /// Drive the recorder towards `recording`. Returns at once; the outcome
    /// arrives as a [`VoiceEvent`]. Repeating the current state is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_recording(&self, recording: bool) {
        let mut slot = self.shared.slot();
        match (recording, slot.state) {
            (true, RecordingState::Stopped) => {
                slot.state = RecordingState::Starting;
                slot.stop_requested = false;
                drop(slot);
                tokio::spawn(open_session(Arc::clone(&self.shared)));
            }
            (true, RecordingState::Starting) => slot.stop_requested = false,
            (true, RecordingState::Stopping) => {
                debug!("previous recording still finalizing; ignoring start");
            }
            (false, RecordingState::Starting) => slot.stop_requested = true,
            (false, RecordingState::Recording) => {
                let session = slot.session.take();
                slot.state = RecordingState::Stopping;
                drop(slot);
                if let Some(session) = session {
                    self.shared.emit(VoiceEvent::RecordingStopped);
                    tokio::spawn(finish_session(Arc::clone(&self.shared), session));
                }
            }
            _ => {}
        }
    }
}

async fn open_session(shared: Arc<Shared>) {
    let source = Arc::clone(&shared.source);
    let opened = match tokio::task::spawn_blocking(move || source.open()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let session = match opened {
        Ok(session) => session,
        Err(reason) => {
            warn!(error = %reason, "microphone unavailable");
            shared.slot().state = RecordingState::Stopped;
            shared.emit(VoiceEvent::MicrophoneDenied(reason));
            return;
        }
    };

    let stopped_early = {
        let mut slot = shared.slot();
        if slot.stop_requested {
            slot.state = RecordingState::Stopping;
            slot.stop_requested = false;
            Some(session)
        } else {
            slot.state = RecordingState::Recording;
            slot.session = Some(session);
            None
        }
    };

    shared.emit(VoiceEvent::RecordingStarted);
    match stopped_early {
        Some(session) => {
            info!("recording stopped while the microphone was opening");
            shared.emit(VoiceEvent::RecordingStopped);
            finish_session(shared, session).await;
        }
        None => info!("recording started"),
    }
}

async fn finish_session(shared: Arc<Shared>, session: Box<dyn RecordingSession>) {
    let finished = tokio::task::spawn_blocking(move || session.finish()).await;
    shared.slot().state = RecordingState::Stopped;

    let clip = match finished {
        Ok(Ok(clip)) => clip,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to finalize recording");
            shared.emit(VoiceEvent::TranscriptionFailed(e.to_string()));
            return;
        }
        Err(e) => {
            warn!(error = %e, "recording finalize task failed");
            shared.emit(VoiceEvent::TranscriptionFailed(e.to_string()));
            return;
        }
    };

    if clip.is_empty() {
        info!("recording was empty; skipping transcription");
        shared.emit(VoiceEvent::EmptyRecording);
        return;
    }

    let event = match shared.transcriber.transcribe(&clip).await {
        Ok(text) => VoiceEvent::Transcribed(text),
        Err(e) => {
            warn!(error = %e, "transcription failed");
            VoiceEvent::TranscriptionFailed(e.to_string())
        }
    };
    shared.emit(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GateError, Result};
    use crate::voice::capture::AudioClip;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeMic {
        samples: Vec<f32>,
        deny: bool,
        opened: AtomicUsize,
    }

    struct FakeSession(Vec<f32>);

    impl RecordingSession for FakeSession {
        fn finish(self: Box<Self>) -> Result<AudioClip> {
            Ok(AudioClip {
                samples: self.0,
                sample_rate: 16_000,
            })
        }
    }

    impl AudioSource for FakeMic {
        fn open(&self) -> Result<Box<dyn RecordingSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(GateError::Audio("permission denied".into()));
            }
            Ok(Box::new(FakeSession(self.samples.clone())))
        }
    }

    struct EchoTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
            Ok(format!("{} samples", clip.samples.len()))
        }
    }

    fn adapter(
        samples: Vec<f32>,
        deny: bool,
    ) -> (
        VoiceCaptureAdapter,
        mpsc::UnboundedReceiver<VoiceEvent>,
        Arc<FakeMic>,
    ) {
        let mic = Arc::new(FakeMic {
            samples,
            deny,
            opened: AtomicUsize::new(0),
        });
        let (adapter, rx) = VoiceCaptureAdapter::new(mic.clone(), Arc::new(EchoTranscriber));
        (adapter, rx, mic)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> Option<VoiceEvent> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for voice event")
    }

    #[tokio::test]
    async fn record_then_stop_delivers_transcription() {
        let (adapter, mut rx, _) = adapter(vec![0.1; 320], false);
        adapter.toggle();
        assert_eq!(adapter.state(), RecordingState::Starting);
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStarted));
        assert_eq!(adapter.state(), RecordingState::Recording);

        adapter.toggle();
        assert_eq!(adapter.state(), RecordingState::Stopping);
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStopped));
        assert_eq!(
            next(&mut rx).await,
            Some(VoiceEvent::Transcribed("320 samples".into()))
        );
        assert_eq!(adapter.state(), RecordingState::Stopped);
    }

    #[tokio::test]
    async fn denied_microphone_stays_stopped() {
        let (adapter, mut rx, _) = adapter(Vec::new(), true);
        adapter.set_recording(true);
        assert!(matches!(
            next(&mut rx).await,
            Some(VoiceEvent::MicrophoneDenied(_))
        ));
        assert_eq!(adapter.state(), RecordingState::Stopped);
    }

    #[tokio::test]
    async fn repeated_start_opens_one_session() {
        let (adapter, mut rx, mic) = adapter(vec![0.0; 10], false);
        adapter.set_recording(true);
        adapter.set_recording(true);
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStarted));
        adapter.set_recording(true);
        assert_eq!(mic.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_recording_is_noop() {
        let (adapter, mut rx, _) = adapter(vec![0.0; 10], false);
        adapter.set_recording(false);
        assert!(rx.try_recv().is_err());
        assert_eq!(adapter.state(), RecordingState::Stopped);
    }

    #[tokio::test]
    async fn stop_while_opening_finishes_the_session() {
        let (adapter, mut rx, _) = adapter(vec![0.1; 64], false);
        adapter.set_recording(true);
        adapter.set_recording(false);

        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStarted));
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStopped));
        assert_eq!(
            next(&mut rx).await,
            Some(VoiceEvent::Transcribed("64 samples".into()))
        );
        assert_eq!(adapter.state(), RecordingState::Stopped);
    }

    #[tokio::test]
    async fn empty_recording_skips_transcription() {
        let (adapter, mut rx, _) = adapter(Vec::new(), false);
        adapter.set_recording(true);
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStarted));
        adapter.set_recording(false);
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::RecordingStopped));
        assert_eq!(next(&mut rx).await, Some(VoiceEvent::EmptyRecording));
    }
}
