//! Voice input: microphone capture, transcription, and the push-to-talk adapter.

pub mod adapter;
pub mod capture;
pub mod transcribe;

pub use adapter::{RecordingState, VoiceCaptureAdapter, VoiceEvent};
pub use capture::{AudioClip, AudioSource, CpalMicrophone, RecordingSession};
pub use transcribe::{HttpTranscriber, Transcriber};
