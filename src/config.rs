//! Configuration types for the command palette.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallgateConfig {
    /// Conversational backend settings.
    pub backend: BackendConfig,
    /// Speech-to-text service settings.
    pub transcription: TranscriptionConfig,
    /// Microphone capture settings.
    pub audio: AudioConfig,
}

/// Chat backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Chat endpoint. Confirmations go to `<chat_url>/confirm-tool-call`.
    pub chat_url: String,
    /// Per-request timeout in seconds (None = wait for the backend indefinitely).
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:8000/api/chat".to_owned(),
            request_timeout_secs: None,
        }
    }
}

/// Transcription service configuration (OpenAI-compatible audio API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Full URL of the transcription endpoint.
    pub url: String,
    /// Model name sent in the multipart form.
    pub model: String,
    /// Bearer token. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            url: "https://api.groq.com/openai/v1/audio/transcriptions".to_owned(),
            model: "whisper-large-v3-turbo".to_owned(),
            api_key: None,
            api_key_env: "GROQ_API_KEY".to_owned(),
        }
    }
}

impl TranscriptionConfig {
    /// Resolve the bearer token from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

/// Microphone capture configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (None = system default).
    pub input_device: Option<String>,
}

impl CallgateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::GateError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/callgate/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("callgate-config"))
            .join("callgate")
            .join("config.toml")
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing file cannot be parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend_and_groq() {
        let config = CallgateConfig::default();
        assert_eq!(config.backend.chat_url, "http://localhost:8000/api/chat");
        assert!(config.backend.request_timeout_secs.is_none());
        assert_eq!(config.transcription.model, "whisper-large-v3-turbo");
        assert_eq!(config.transcription.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CallgateConfig::default();
        config.backend.chat_url = "http://example.test/chat".to_string();
        config.backend.request_timeout_secs = Some(30);
        config.audio.input_device = Some("USB Mic".to_string());

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = match CallgateConfig::from_file(&path) {
            Ok(c) => c,
            Err(_) => unreachable!("load should succeed"),
        };
        assert_eq!(loaded.backend.chat_url, "http://example.test/chat");
        assert_eq!(loaded.backend.request_timeout_secs, Some(30));
        assert_eq!(loaded.audio.input_device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transcription]\nmodel = \"whisper-large-v3\"\n")
            .expect("write config");

        let loaded = CallgateConfig::from_file(&path).expect("parse partial config");
        assert_eq!(loaded.transcription.model, "whisper-large-v3");
        assert_eq!(
            loaded.transcription.url,
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );
        assert_eq!(loaded.backend.chat_url, "http://localhost:8000/api/chat");
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write config");

        let result = CallgateConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::GateError::Config(_))));
    }

    #[test]
    fn load_or_default_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let loaded = CallgateConfig::load_or_default(&dir.path().join("absent.toml"))
            .expect("defaults");
        assert_eq!(loaded.backend.chat_url, BackendConfig::default().chat_url);
    }

    #[test]
    fn explicit_api_key_wins_over_environment() {
        let config = TranscriptionConfig {
            api_key: Some("from-config".to_string()),
            api_key_env: "CALLGATE_TEST_UNSET_VARIABLE".to_string(),
            ..TranscriptionConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn blank_api_key_with_unset_env_resolves_to_none() {
        let config = TranscriptionConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "CALLGATE_TEST_UNSET_VARIABLE".to_string(),
            ..TranscriptionConfig::default()
        };
        assert!(config.resolve_api_key().is_none());
    }
}
