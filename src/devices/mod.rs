//! Subprocess-backed speech devices: a streaming speech-to-text command for capture,
//! a synthesizer command for playback and a voice listing command for the catalog.

mod capture;
mod catalog;
mod playback;

pub use capture::{parse_capture_line, CaptureLine, CommandCapture};
pub use catalog::{parse_voice_table, VoiceCatalog};
pub use playback::CommandSpeaker;

use crate::config::{sanitize_command, AppConfig};
use crate::voice::{DeviceEvent, Utterance, VoiceDevices, VoiceHandle};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::Path;

/// Production [`VoiceDevices`] built from the configured helper commands.
pub struct CommandDevices {
    capture: CommandCapture,
    speaker: CommandSpeaker,
    catalog: VoiceCatalog,
    event_tx: Sender<DeviceEvent>,
    event_rx: Receiver<DeviceEvent>,
}

impl CommandDevices {
    pub fn new(stt_argv: Vec<String>, tts_argv: Vec<String>, voices_argv: Vec<String>) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            capture: CommandCapture::new(stt_argv),
            speaker: CommandSpeaker::new(tts_argv),
            catalog: VoiceCatalog::new(voices_argv),
            event_tx,
            event_rx,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            sanitize_command(&config.stt_cmd, "--stt-cmd")?,
            sanitize_command(&config.tts_cmd, "--tts-cmd")?,
            sanitize_command(&config.voices_cmd, "--voices-cmd")?,
        ))
    }
}

impl VoiceDevices for CommandDevices {
    fn capture_supported(&self) -> bool {
        self.capture.supported()
    }

    fn start_capture(&mut self, capture: u64, lang: &str) -> Result<()> {
        self.capture.start(capture, lang, self.event_tx.clone())
    }

    fn stop_capture(&mut self) {
        self.capture.stop();
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        self.speaker.speak(utterance, &self.event_tx)
    }

    fn cancel_playback(&mut self) {
        self.speaker.cancel();
    }

    fn list_voices(&mut self) -> Vec<VoiceHandle> {
        self.catalog.voices(&self.event_tx)
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        if let Some(event) = self.speaker.poll_finished() {
            return Some(event);
        }
        self.event_rx.try_recv().ok()
    }
}

impl Drop for CommandDevices {
    fn drop(&mut self) {
        self.capture.stop();
        self.speaker.cancel();
    }
}

/// True when `program` names an existing file or something found on `PATH`.
pub(crate) fn program_available(program: &str) -> bool {
    let path = Path::new(program);
    if path.is_absolute() || program.contains(std::path::MAIN_SEPARATOR) {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
