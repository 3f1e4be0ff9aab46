//! Speech-to-text over an OpenAI-compatible transcription endpoint.

use std::io::Cursor;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::TranscriptionConfig;
use crate::error::{GateError, Result};
use crate::voice::capture::AudioClip;

/// Turns a finished recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Multipart upload client (`file` + `model`, bearer auth).
pub struct HttpTranscriber {
    url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTranscriber")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl HttpTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Err(GateError::Transcription("no API key configured".into()));
        };
        let wav = encode_wav(clip)?;
        tracing::info!(
            bytes = wav.len(),
            duration_secs = clip.duration_secs(),
            "sending recording for transcription"
        );

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| GateError::Transcription(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GateError::Transcription(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Transcription(format!(
                "transcription request failed: {}",
                status.as_u16()
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| GateError::Transcription(format!("invalid response body: {e}")))?;
        Ok(body.text)
    }
}

/// Encode a clip as 16-bit mono PCM WAV.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| GateError::Audio(format!("failed to start WAV encoder: {e}")))?;
        for &sample in &clip.samples {
            let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| GateError::Audio(format!("failed to write WAV sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| GateError::Audio(format!("failed to finalize WAV: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_and_samples_round_trip() {
        let clip = AudioClip {
            samples: vec![0.0, 1.0, -1.0, 2.0],
            sample_rate: 16_000,
        };
        let bytes = encode_wav(&clip).expect("encode");
        assert_eq!(&bytes[..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("decode");
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .expect("samples");
        assert_eq!(samples, vec![0, i16::MAX, -i16::MAX, i16::MAX]);
    }

    #[test]
    fn debug_hides_api_key() {
        let transcriber = HttpTranscriber::new(&TranscriptionConfig {
            api_key: Some("secret".into()),
            ..TranscriptionConfig::default()
        });
        let printed = format!("{transcriber:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("has_api_key: true"));
    }
}
