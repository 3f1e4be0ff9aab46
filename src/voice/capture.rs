//! Microphone capture using cpal.
//!
//! A recording session owns the input stream on a dedicated thread from
//! `open` until `finish`, so at most one stream is alive per session and the
//! (non-`Send`) cpal stream never crosses threads.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use crate::config::AudioConfig;
use crate::error::{GateError, Result};

/// Mono audio captured during one recording session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Something that can open the microphone.
pub trait AudioSource: Send + Sync {
    /// Acquire the input device and start buffering.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is missing or access is denied.
    fn open(&self) -> Result<Box<dyn RecordingSession>>;
}

/// An open microphone stream.
pub trait RecordingSession: Send {
    /// Stop capturing and return everything buffered since `open`.
    fn finish(self: Box<Self>) -> Result<AudioClip>;
}

/// The system microphone (or a named input device).
#[derive(Debug, Clone, Default)]
pub struct CpalMicrophone {
    input_device: Option<String>,
}

impl CpalMicrophone {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            input_device: config.input_device.clone(),
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| GateError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl AudioSource for CpalMicrophone {
    fn open(&self) -> Result<Box<dyn RecordingSession>> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<u32>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (chunk_tx, chunk_rx) = std_mpsc::channel::<Vec<f32>>();
        let device_name = self.input_device.clone();

        let handle = std::thread::Builder::new()
            .name("callgate-capture".into())
            .spawn(move || {
                let (stream, sample_rate) = match start_stream(device_name.as_deref(), chunk_tx)
                {
                    Ok(started) => started,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(sample_rate));
                // Hold the stream alive until the session is finished or dropped.
                let _ = stop_rx.recv();
                drop(stream);
                info!("audio capture stopped");
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| GateError::Audio("capture thread exited before starting".into()))??;

        Ok(Box::new(CpalSession {
            stop_tx,
            handle: Some(handle),
            chunk_rx,
            sample_rate,
        }))
    }
}

struct CpalSession {
    stop_tx: std_mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
    chunk_rx: std_mpsc::Receiver<Vec<f32>>,
    sample_rate: u32,
}

impl RecordingSession for CpalSession {
    fn finish(mut self: Box<Self>) -> Result<AudioClip> {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            return Err(GateError::Audio("capture thread panicked".into()));
        }

        let samples: Vec<f32> = self.chunk_rx.try_iter().flatten().collect();
        Ok(AudioClip {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

fn start_stream(
    device_name: Option<&str>,
    chunk_tx: std_mpsc::Sender<Vec<f32>>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| GateError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| GateError::Audio(format!("input device '{name}' not found")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| GateError::Audio("no default input device".into()))?
    };

    let default_config = device
        .default_input_config()
        .map_err(|e| GateError::Audio(format!("no default input config: {e}")))?;

    let stream_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let channels = stream_config.channels;
    let sample_rate = stream_config.sample_rate;

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if channels > 1 {
                    to_mono(data, channels)
                } else {
                    data.to_vec()
                };
                if chunk_tx.send(mono).is_err() {
                    debug!("capture session gone, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| GateError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| GateError::Audio(format!("failed to start input stream: {e}")))?;

    info!("audio capture started: {sample_rate}Hz, {channels} channels");
    Ok((stream, sample_rate))
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}
