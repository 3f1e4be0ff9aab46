//! Line-oriented terminal front-end.
//!
//! Plain lines are submitted as commands; lines starting with `/` drive the
//! confirmation surface and voice input. The palette is redrawn on stdout
//! whenever its snapshot changes. Diagnostics stay on stderr.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{GateError, Result};
use crate::runtime::{PaletteCommand, PaletteHandle};

pub const HELP: &str = "\
Type a command and press Enter.
  /confirm            approve the pending action
  /cancel             reject the pending action
  /close              close the confirmation (same as cancel)
  /edit <path>=<val>  change an argument before confirming (e.g. /edit destination.city=\"Rome\")
  /voice              start/stop voice recording
  /help               show this help
  /quit               exit";

/// What a terminal line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum LineAction {
    Command(PaletteCommand),
    Help,
    Unknown(String),
}

/// Interpret one input line.
pub fn parse_line(line: &str) -> LineAction {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return LineAction::Command(PaletteCommand::SubmitText(trimmed.to_owned()));
    };

    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    match name {
        "confirm" => LineAction::Command(PaletteCommand::Confirm),
        "cancel" => LineAction::Command(PaletteCommand::Cancel),
        "close" => LineAction::Command(PaletteCommand::Dismiss),
        "voice" => LineAction::Command(PaletteCommand::ToggleVoice),
        "quit" | "exit" => LineAction::Command(PaletteCommand::Shutdown),
        "help" => LineAction::Help,
        "edit" => match args.split_once('=') {
            Some((path, raw)) if !path.trim().is_empty() => {
                LineAction::Command(PaletteCommand::EditArgument {
                    path: path.trim().to_owned(),
                    value: parse_edit_value(raw.trim()),
                })
            }
            _ => LineAction::Unknown(trimmed.to_owned()),
        },
        _ => LineAction::Unknown(trimmed.to_owned()),
    }
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_edit_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Drive the palette from stdin until EOF or `/quit`.
///
/// # Errors
///
/// Returns an error if stdin or stdout fail.
pub async fn run_terminal(handle: PaletteHandle) -> Result<()> {
    let mut snapshots = handle.subscribe();
    let printer = tokio::spawn(async move {
        let mut out = BufWriter::new(tokio::io::stdout());
        while snapshots.changed().await.is_ok() {
            let text = snapshots.borrow_and_update().to_string();
            if out.write_all(format!("{text}\n> ").as_bytes()).await.is_err()
                || out.flush().await.is_err()
            {
                tracing::warn!("stdout closed; stopping palette printer");
                break;
            }
        }
    });

    let mut out = tokio::io::stdout();
    out.write_all(format!("{HELP}\n> ").as_bytes()).await?;
    out.flush().await?;

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| GateError::Channel(format!("failed to read from stdin: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); shutting down palette");
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            LineAction::Command(command) => {
                let stop = command == PaletteCommand::Shutdown;
                if handle.send(command).await.is_err() || stop {
                    break;
                }
            }
            LineAction::Help => {
                out.write_all(format!("{HELP}\n> ").as_bytes()).await?;
                out.flush().await?;
            }
            LineAction::Unknown(input) => {
                out.write_all(format!("unknown command: {input} (try /help)\n> ").as_bytes())
                    .await?;
                out.flush().await?;
            }
        }
    }

    let _ = handle.send(PaletteCommand::Shutdown).await;
    printer.abort();
    let _ = printer.await;
    Ok(())
}
