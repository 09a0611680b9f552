//! One mounted conversation screen: the turn loop plus the voice controller that feeds
//! it spoken turns and reads its replies aloud.

use crate::config::VoiceSettings;
use crate::service::{ConversationService, StartRequest};
use crate::turn::{SessionPhase, TurnLoop, TurnUpdate};
use crate::voice::{VoiceController, VoiceDevices};

pub struct ConversationScreen<S: ConversationService + 'static, D: VoiceDevices> {
    turns: TurnLoop<S>,
    voice: VoiceController<D>,
    notice: Option<String>,
}

impl<S: ConversationService + 'static, D: VoiceDevices> ConversationScreen<S, D> {
    pub fn new(service: S, devices: D, settings: VoiceSettings) -> Self {
        Self {
            turns: TurnLoop::new(service),
            voice: VoiceController::new(devices, settings),
            notice: None,
        }
    }

    pub fn turns(&self) -> &TurnLoop<S> {
        &self.turns
    }

    pub fn voice(&self) -> &VoiceController<D> {
        &self.voice
    }

    pub fn phase(&self) -> SessionPhase {
        self.turns.phase()
    }

    /// Latest voice notice (for example, no capture device).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Pump devices and the pending service call once.
    pub fn tick(&mut self) -> Option<TurnUpdate> {
        self.voice.poll();
        while let Some(utterance) = self.voice.take_utterance() {
            if !self.turns.submit_finalized_utterance(&utterance) {
                crate::log_debug("dropped spoken turn while a reply is pending");
            }
        }

        let update = self.turns.poll();
        if matches!(
            update,
            Some(
                TurnUpdate::InterviewStarted | TurnUpdate::ReplyAppended | TurnUpdate::ReplyFailed
            )
        ) {
            if let Some(last) = self.turns.transcript().last() {
                self.voice.on_message(last, self.turns.is_busy());
            }
        }

        while let Some(notice) = self.voice.take_notice() {
            self.notice = Some(notice);
        }
        update
    }

    pub fn begin(&mut self) {
        self.turns.begin();
    }

    pub fn start(&mut self, request: StartRequest) -> bool {
        self.turns.start(request)
    }

    /// Typed turns are only taken in text mode.
    pub fn submit_text(&mut self, text: &str) -> bool {
        if self.voice.is_voice_mode() {
            return false;
        }
        self.turns.submit_text(text)
    }

    pub fn toggle_voice(&mut self) {
        self.voice.toggle_voice();
        while let Some(notice) = self.voice.take_notice() {
            self.notice = Some(notice);
        }
    }

    pub fn press_mic(&mut self) {
        let busy = self.turns.is_busy();
        self.voice.press_mic(busy);
    }

    /// Finish the interview; the conversation screen goes away, so voice I/O stops.
    pub fn end_session(&mut self) -> bool {
        if !self.turns.end_session() {
            return false;
        }
        self.voice.teardown();
        true
    }

    pub fn start_new(&mut self) {
        self.voice.teardown();
        self.notice = None;
        self.turns.start_new();
    }

    pub fn teardown(&mut self) {
        self.voice.teardown();
    }

    pub fn status_text(&self) -> String {
        self.voice.status_text(self.turns.is_busy())
    }
}
