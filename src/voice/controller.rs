use super::machine::{transition, VoiceEffect, VoiceEvent};
use super::select::select_voice;
use super::{DeviceEvent, Utterance, VoiceDevices, VoiceMode, VoiceSession};
use crate::config::VoiceSettings;
use crate::service::Message;
use crate::{log_debug, log_debug_content};
use std::collections::VecDeque;
use std::time::Instant;

/// Owns the capture/playback devices and drives them from the voice state machine.
pub struct VoiceController<D: VoiceDevices> {
    devices: D,
    session: VoiceSession,
    settings: VoiceSettings,
    listening_since: Option<Instant>,
    utterances: VecDeque<String>,
    notices: VecDeque<String>,
}

impl<D: VoiceDevices> VoiceController<D> {
    /// Build the controller and run the initial voice selection.
    pub fn new(devices: D, settings: VoiceSettings) -> Self {
        let mut controller = Self {
            devices,
            session: VoiceSession::default(),
            settings,
            listening_since: None,
            utterances: VecDeque::new(),
            notices: VecDeque::new(),
        };
        controller.refresh_voice();
        controller
    }

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    pub fn is_voice_mode(&self) -> bool {
        self.session.mode() == VoiceMode::Voice
    }

    pub fn toggle_voice(&mut self) {
        let capture_supported = self.devices.capture_supported();
        self.dispatch(VoiceEvent::ToggleMode { capture_supported });
    }

    /// Start listening from idle, or stop an active capture.
    pub fn press_mic(&mut self, busy: bool) {
        self.dispatch(VoiceEvent::MicPressed { busy });
    }

    /// Tell the controller a transcript entry was appended.
    pub fn on_message(&mut self, message: &Message, busy: bool) {
        self.dispatch(VoiceEvent::MessageArrived {
            role: message.role,
            content: message.content.clone(),
            busy,
        });
    }

    /// Screen teardown: silence everything and fall back to text mode.
    pub fn teardown(&mut self) {
        self.dispatch(VoiceEvent::Teardown);
        self.utterances.clear();
    }

    /// Re-run voice selection against the current catalog.
    pub fn refresh_voice(&mut self) {
        let voices = self.devices.list_voices();
        let chosen = select_voice(
            &voices,
            &self.settings.lang,
            self.settings.preferred_voice.as_deref(),
        );
        self.dispatch(VoiceEvent::VoiceChosen(chosen));
    }

    /// Drain device events and enforce the optional listen deadline.
    pub fn poll(&mut self) {
        while let Some(event) = self.devices.poll_event() {
            if event == DeviceEvent::VoicesChanged {
                self.refresh_voice();
                continue;
            }
            self.dispatch(VoiceEvent::Device(event));
        }
        if let (Some(timeout), Some(since)) = (self.settings.listen_timeout, self.listening_since)
        {
            if since.elapsed() >= timeout {
                self.dispatch(VoiceEvent::ListenTimedOut);
            }
        }
    }

    /// Next finalized utterance captured from the microphone.
    pub fn take_utterance(&mut self) -> Option<String> {
        self.utterances.pop_front()
    }

    /// Next user-visible notice (for example, capture unsupported).
    pub fn take_notice(&mut self) -> Option<String> {
        self.notices.pop_front()
    }

    /// Prompt shown in place of the text input while in voice mode.
    pub fn status_text(&self, busy: bool) -> String {
        if self.session.speaking() {
            "Interviewer is speaking...".to_string()
        } else if self.session.listening() {
            let partial = self.session.partial_transcript();
            if partial.is_empty() {
                "Listening...".to_string()
            } else {
                format!("Listening... {partial}")
            }
        } else if busy {
            "Thinking...".to_string()
        } else {
            "Press Ctrl+R to speak".to_string()
        }
    }

    fn dispatch(&mut self, event: VoiceEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for effect in transition(&mut self.session, event) {
                if let Some(follow_up) = self.apply(effect) {
                    pending.push_back(follow_up);
                }
            }
        }
        match (self.session.listening(), self.listening_since) {
            (true, None) => self.listening_since = Some(Instant::now()),
            (false, Some(_)) => self.listening_since = None,
            _ => {}
        }
    }

    /// Perform one effect; device failures come back as events for the machine.
    fn apply(&mut self, effect: VoiceEffect) -> Option<VoiceEvent> {
        match effect {
            VoiceEffect::StartCapture { capture } => {
                match self.devices.start_capture(capture, &self.settings.lang) {
                    Ok(()) => None,
                    Err(err) => Some(VoiceEvent::Device(DeviceEvent::CaptureError {
                        capture,
                        message: format!("{err:#}"),
                    })),
                }
            }
            VoiceEffect::StopCapture => {
                self.devices.stop_capture();
                None
            }
            VoiceEffect::CancelPlayback => {
                self.devices.cancel_playback();
                None
            }
            VoiceEffect::Speak {
                utterance,
                text,
                voice,
            } => {
                let request = Utterance {
                    id: utterance,
                    text,
                    voice,
                    rate: self.settings.rate,
                    pitch: self.settings.pitch,
                };
                match self.devices.speak(&request) {
                    Ok(()) => None,
                    Err(err) => {
                        log_debug(&format!("speech playback failed: {err:#}"));
                        Some(VoiceEvent::Device(DeviceEvent::PlaybackFinished {
                            utterance,
                        }))
                    }
                }
            }
            VoiceEffect::EmitUtterance(text) => {
                log_debug_content(&format!("finalized utterance: {text}"));
                self.utterances.push_back(text);
                None
            }
            VoiceEffect::Notice(text) => {
                log_debug(&format!("voice notice: {text}"));
                self.notices.push_back(text);
                None
            }
            VoiceEffect::Log(text) => {
                log_debug(&text);
                None
            }
        }
    }
}
