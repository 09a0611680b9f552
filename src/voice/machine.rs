//! Pure `(state, event) -> effects` transition function for voice I/O.

use super::{DeviceEvent, VoiceHandle, VoiceMode, VoicePhase, VoiceSession};
use crate::service::Role;
use crate::speech;

pub(crate) const CAPTURE_UNSUPPORTED_NOTICE: &str =
    "Sorry, speech capture is not available on this system.";

/// Inputs to the voice state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// User flipped between text and voice mode.
    ToggleMode { capture_supported: bool },
    /// User pressed the microphone control.
    MicPressed { busy: bool },
    /// A transcript entry was appended; `busy` is true while a send is in flight.
    MessageArrived {
        role: Role,
        content: String,
        busy: bool,
    },
    /// Catalog-driven voice selection finished.
    VoiceChosen(Option<VoiceHandle>),
    /// Caller-configured listen deadline passed.
    ListenTimedOut,
    /// Conversation screen is going away.
    Teardown,
    Device(DeviceEvent),
}

/// Side effects the controller must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEffect {
    StartCapture {
        capture: u64,
    },
    StopCapture,
    CancelPlayback,
    Speak {
        utterance: u64,
        text: String,
        voice: Option<VoiceHandle>,
    },
    /// A finalized, trimmed, non-empty utterance for the turn loop.
    EmitUtterance(String),
    /// User-visible notice.
    Notice(String),
    Log(String),
}

/// Advance `session` for `event` and return the effects to apply.
pub fn transition(session: &mut VoiceSession, event: VoiceEvent) -> Vec<VoiceEffect> {
    match event {
        VoiceEvent::ToggleMode { capture_supported } => toggle_mode(session, capture_supported),
        VoiceEvent::MicPressed { busy } => mic_pressed(session, busy),
        VoiceEvent::MessageArrived {
            role,
            content,
            busy,
        } => message_arrived(session, role, &content, busy),
        VoiceEvent::VoiceChosen(voice) => {
            let note = match &voice {
                Some(voice) => format!("voice selected: {} ({})", voice.name, voice.locale),
                None => "no voice selected; playback uses the device default".to_string(),
            };
            session.chosen_voice = voice;
            vec![VoiceEffect::Log(note)]
        }
        VoiceEvent::ListenTimedOut => {
            if !session.listening() {
                return Vec::new();
            }
            go_idle(session);
            vec![
                VoiceEffect::StopCapture,
                VoiceEffect::Log("listening timed out without a final transcript".to_string()),
            ]
        }
        VoiceEvent::Teardown => {
            session.mode = VoiceMode::Text;
            go_idle(session);
            vec![VoiceEffect::CancelPlayback, VoiceEffect::StopCapture]
        }
        VoiceEvent::Device(device) => device_event(session, device),
    }
}

fn go_idle(session: &mut VoiceSession) {
    session.phase = VoicePhase::Idle;
    session.partial_transcript.clear();
}

fn toggle_mode(session: &mut VoiceSession, capture_supported: bool) -> Vec<VoiceEffect> {
    match session.mode {
        VoiceMode::Text if !capture_supported => {
            vec![VoiceEffect::Notice(CAPTURE_UNSUPPORTED_NOTICE.to_string())]
        }
        VoiceMode::Text => {
            session.mode = VoiceMode::Voice;
            go_idle(session);
            vec![VoiceEffect::Log("voice mode on".to_string())]
        }
        VoiceMode::Voice => {
            session.mode = VoiceMode::Text;
            go_idle(session);
            vec![
                VoiceEffect::CancelPlayback,
                VoiceEffect::StopCapture,
                VoiceEffect::Log("voice mode off".to_string()),
            ]
        }
    }
}

fn mic_pressed(session: &mut VoiceSession, busy: bool) -> Vec<VoiceEffect> {
    if session.mode != VoiceMode::Voice {
        return Vec::new();
    }
    match session.phase {
        VoicePhase::Idle if busy => vec![VoiceEffect::Log(
            "mic ignored while a reply is pending".to_string(),
        )],
        VoicePhase::Idle => {
            let capture = session.allocate_id();
            session.phase = VoicePhase::Listening { capture };
            session.partial_transcript.clear();
            vec![VoiceEffect::StartCapture { capture }]
        }
        VoicePhase::Listening { .. } => {
            go_idle(session);
            vec![VoiceEffect::StopCapture]
        }
        VoicePhase::Speaking { .. } => vec![VoiceEffect::Log(
            "mic ignored while the interviewer is speaking".to_string(),
        )],
    }
}

fn message_arrived(
    session: &mut VoiceSession,
    role: Role,
    content: &str,
    busy: bool,
) -> Vec<VoiceEffect> {
    if session.mode != VoiceMode::Voice || role != Role::Assistant || busy {
        return Vec::new();
    }
    if session.listening() {
        return vec![VoiceEffect::Log(
            "assistant message not spoken while listening".to_string(),
        )];
    }
    let text = speech::clean(content);
    let mut effects = vec![VoiceEffect::CancelPlayback];
    if text.trim().is_empty() {
        go_idle(session);
        return effects;
    }
    let utterance = session.allocate_id();
    session.phase = VoicePhase::Speaking { utterance };
    effects.push(VoiceEffect::Speak {
        utterance,
        text,
        voice: session.chosen_voice.clone(),
    });
    effects
}

fn device_event(session: &mut VoiceSession, event: DeviceEvent) -> Vec<VoiceEffect> {
    let active_capture = match session.phase {
        VoicePhase::Listening { capture } => Some(capture),
        _ => None,
    };
    let active_utterance = match session.phase {
        VoicePhase::Speaking { utterance } => Some(utterance),
        _ => None,
    };

    match event {
        DeviceEvent::CaptureInterim { capture, text } if active_capture == Some(capture) => {
            session.partial_transcript = text;
            Vec::new()
        }
        DeviceEvent::CaptureFinal { capture, text } if active_capture == Some(capture) => {
            go_idle(session);
            let mut effects = vec![VoiceEffect::StopCapture];
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                effects.push(VoiceEffect::EmitUtterance(trimmed.to_string()));
            }
            effects
        }
        DeviceEvent::CaptureEnded { capture } if active_capture == Some(capture) => {
            go_idle(session);
            vec![VoiceEffect::StopCapture]
        }
        DeviceEvent::CaptureError { capture, message } if active_capture == Some(capture) => {
            go_idle(session);
            vec![
                VoiceEffect::StopCapture,
                VoiceEffect::Log(format!("speech capture error: {message}")),
            ]
        }
        DeviceEvent::PlaybackStarted { utterance } => {
            vec![VoiceEffect::Log(format!("playback {utterance} started"))]
        }
        DeviceEvent::PlaybackFinished { utterance } if active_utterance == Some(utterance) => {
            go_idle(session);
            Vec::new()
        }
        // Late events from a capture or utterance that is no longer current.
        _ => Vec::new(),
    }
}
