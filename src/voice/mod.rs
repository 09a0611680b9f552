//! Voice I/O: half-duplex coordination of speech capture and playback.
//!
//! `machine` holds the pure transition function, `controller` applies its effects to
//! an injected [`VoiceDevices`] capability, and `select` picks a synthesizer voice.

mod controller;
mod machine;
mod select;
#[cfg(test)]
mod tests;

pub use controller::VoiceController;
pub use machine::{transition, VoiceEffect, VoiceEvent};
pub use select::select_voice;

use anyhow::Result;
use serde::Serialize;

/// Whether the conversation screen uses typed or spoken turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    Text,
    Voice,
}

/// Which device is active. Capture and playback share one phase so they can never
/// both be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePhase {
    Idle,
    Listening { capture: u64 },
    Speaking { utterance: u64 },
}

/// Synthesizer voice reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceHandle {
    pub name: String,
    pub locale: String,
}

impl VoiceHandle {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }
}

/// One request to the playback device.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub voice: Option<VoiceHandle>,
    pub rate: f32,
    pub pitch: f32,
}

/// Events the capture/playback hardware reports back. Ids tie each event to the
/// capture or utterance that produced it so late events from a cancelled operation
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    CaptureInterim { capture: u64, text: String },
    CaptureFinal { capture: u64, text: String },
    CaptureEnded { capture: u64 },
    CaptureError { capture: u64, message: String },
    PlaybackStarted { utterance: u64 },
    PlaybackFinished { utterance: u64 },
    VoicesChanged,
}

/// Capture, playback and voice catalog handles owned by the controller.
pub trait VoiceDevices {
    /// False when the host has no usable speech capture.
    fn capture_supported(&self) -> bool;
    fn start_capture(&mut self, capture: u64, lang: &str) -> Result<()>;
    fn stop_capture(&mut self);
    fn speak(&mut self, utterance: &Utterance) -> Result<()>;
    fn cancel_playback(&mut self);
    fn list_voices(&mut self) -> Vec<VoiceHandle>;
    /// Next pending device event, without blocking.
    fn poll_event(&mut self) -> Option<DeviceEvent>;
}

/// Transient voice state for one mounted conversation screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSession {
    mode: VoiceMode,
    phase: VoicePhase,
    partial_transcript: String,
    chosen_voice: Option<VoiceHandle>,
    next_id: u64,
}

impl Default for VoiceSession {
    fn default() -> Self {
        Self {
            mode: VoiceMode::Text,
            phase: VoicePhase::Idle,
            partial_transcript: String::new(),
            chosen_voice: None,
            next_id: 1,
        }
    }
}

impl VoiceSession {
    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn phase(&self) -> VoicePhase {
        self.phase
    }

    pub fn listening(&self) -> bool {
        matches!(self.phase, VoicePhase::Listening { .. })
    }

    pub fn speaking(&self) -> bool {
        matches!(self.phase, VoicePhase::Speaking { .. })
    }

    pub fn partial_transcript(&self) -> &str {
        &self.partial_transcript
    }

    pub fn chosen_voice(&self) -> Option<&VoiceHandle> {
        self.chosen_voice.as_ref()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}
