use super::program_available;
use crate::voice::DeviceEvent;
use crate::{log_debug, log_debug_content};
use anyhow::{bail, Context, Result};
use crossbeam_channel::Sender;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::thread;

/// One line printed by the speech-to-text helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureLine {
    Partial(String),
    Final(String),
    Error(String),
}

#[derive(Debug, Deserialize)]
struct RawCaptureLine {
    partial: Option<String>,
    #[serde(rename = "final")]
    final_text: Option<String>,
    error: Option<String>,
}

/// Parse a helper line. JSON objects carry `partial`, `final` or `error`; a bare text
/// line counts as a final transcript.
pub fn parse_capture_line(line: &str) -> Option<CaptureLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        let raw: RawCaptureLine = match serde_json::from_str(trimmed) {
            Ok(raw) => raw,
            Err(err) => {
                log_debug(&format!("ignoring malformed capture line: {err}"));
                return None;
            }
        };
        if let Some(error) = raw.error {
            return Some(CaptureLine::Error(error));
        }
        if let Some(text) = raw.final_text {
            return Some(CaptureLine::Final(text));
        }
        return raw.partial.map(CaptureLine::Partial);
    }
    Some(CaptureLine::Final(trimmed.to_string()))
}

struct ActiveCapture {
    id: u64,
    child: Child,
}

/// Streams transcripts from a long-running speech-to-text command.
pub struct CommandCapture {
    argv: Vec<String>,
    active: Option<ActiveCapture>,
}

impl CommandCapture {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv, active: None }
    }

    pub fn supported(&self) -> bool {
        self.argv
            .first()
            .is_some_and(|program| program_available(program))
    }

    /// Spawn the helper and forward its lines as events tagged with `capture`.
    pub fn start(&mut self, capture: u64, lang: &str, events: Sender<DeviceEvent>) -> Result<()> {
        self.stop();
        let Some(program) = self.argv.first() else {
            bail!("speech capture command is empty");
        };
        let mut child = Command::new(program)
            .args(&self.argv[1..])
            .env("CASETERM_LANG", lang)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start speech capture command '{program}'"))?;
        let stdout = child
            .stdout
            .take()
            .context("failed to open speech capture stdout")?;
        log_debug(&format!("capture {capture} started (lang={lang})"));

        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                let event = match parse_capture_line(&line) {
                    Some(CaptureLine::Partial(text)) => DeviceEvent::CaptureInterim { capture, text },
                    Some(CaptureLine::Final(text)) => {
                        log_debug_content(&format!("capture {capture} final: {text}"));
                        DeviceEvent::CaptureFinal { capture, text }
                    }
                    Some(CaptureLine::Error(message)) => {
                        DeviceEvent::CaptureError { capture, message }
                    }
                    None => continue,
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            let _ = events.send(DeviceEvent::CaptureEnded { capture });
        });

        self.active = Some(ActiveCapture { id: capture, child });
        Ok(())
    }

    /// Kill the helper, if any. Its reader thread reports the end with the old id.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            let _ = active.child.kill();
            let _ = active.child.wait();
            log_debug(&format!("capture {} stopped", active.id));
        }
    }
}
