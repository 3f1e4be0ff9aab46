//! Terminal command palette.
//!
//! stdout carries the palette itself; tracing goes to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use callgate::backend::HttpChatBackend;
use callgate::runtime::PaletteRuntime;
use callgate::terminal::run_terminal;
use callgate::voice::{CpalMicrophone, HttpTranscriber, VoiceCaptureAdapter};
use callgate::CallgateConfig;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command palette that asks before the backend runs a tool.
#[derive(Parser)]
#[command(name = "callgate", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the chat endpoint from the config.
    #[arg(long)]
    chat_url: Option<String>,

    /// Disable voice input.
    #[arg(long)]
    no_voice: bool,

    /// List audio input devices and exit.
    #[arg(long)]
    devices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("callgate=info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.devices {
        return list_devices();
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(CallgateConfig::default_config_path);
    let mut config = CallgateConfig::load_or_default(&config_path)?;
    if let Some(url) = cli.chat_url {
        config.backend.chat_url = url;
    }
    info!(
        config = %config_path.display(),
        chat_url = %config.backend.chat_url,
        "starting callgate"
    );

    let backend = Arc::new(HttpChatBackend::new(&config.backend)?);
    let (mut runtime, handle) = PaletteRuntime::new(backend);

    if !cli.no_voice {
        if config.transcription.resolve_api_key().is_none() {
            tracing::warn!(
                env = %config.transcription.api_key_env,
                "no transcription API key configured; voice input will fail until one is set"
            );
        }
        let (adapter, events) = VoiceCaptureAdapter::new(
            Arc::new(CpalMicrophone::new(&config.audio)),
            Arc::new(HttpTranscriber::new(&config.transcription)),
        );
        runtime = runtime.with_voice(adapter, events);
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let runtime_handle = tokio::spawn(runtime.run(cancel.clone()));

    tokio::select! {
        result = run_terminal(handle) => result?,
        () = cancel.cancelled() => {}
    }

    cancel.cancel();
    let _ = runtime_handle.await;
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalMicrophone::list_input_devices()? {
        println!("  - {name}");
    }
    Ok(())
}
