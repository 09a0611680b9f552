use super::*;
use crate::config::VoiceSettings;
use crate::service::Message;
use anyhow::anyhow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    StartCapture(u64),
    StopCapture,
    Speak(Utterance),
    CancelPlayback,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    events: VecDeque<DeviceEvent>,
    voices: Vec<VoiceHandle>,
    unsupported: bool,
    fail_speak: bool,
    fail_capture: bool,
}

#[derive(Clone, Default)]
struct FakeDevices(Rc<RefCell<FakeState>>);

impl FakeDevices {
    fn push(&self, event: DeviceEvent) {
        self.0.borrow_mut().events.push_back(event);
    }

    fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    fn last_capture(&self) -> u64 {
        self.calls()
            .iter()
            .rev()
            .find_map(|call| match call {
                Call::StartCapture(id) => Some(*id),
                _ => None,
            })
            .expect("capture should have started")
    }

    fn spoken(&self) -> Vec<Utterance> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Speak(utterance) => Some(utterance),
                _ => None,
            })
            .collect()
    }
}

impl VoiceDevices for FakeDevices {
    fn capture_supported(&self) -> bool {
        !self.0.borrow().unsupported
    }

    fn start_capture(&mut self, capture: u64, _lang: &str) -> anyhow::Result<()> {
        let mut state = self.0.borrow_mut();
        if state.fail_capture {
            return Err(anyhow!("microphone busy"));
        }
        state.calls.push(Call::StartCapture(capture));
        Ok(())
    }

    fn stop_capture(&mut self) {
        self.0.borrow_mut().calls.push(Call::StopCapture);
    }

    fn speak(&mut self, utterance: &Utterance) -> anyhow::Result<()> {
        let mut state = self.0.borrow_mut();
        if state.fail_speak {
            return Err(anyhow!("no audio sink"));
        }
        state.calls.push(Call::Speak(utterance.clone()));
        Ok(())
    }

    fn cancel_playback(&mut self) {
        self.0.borrow_mut().calls.push(Call::CancelPlayback);
    }

    fn list_voices(&mut self) -> Vec<VoiceHandle> {
        self.0.borrow().voices.clone()
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.0.borrow_mut().events.pop_front()
    }
}

fn controller_with(devices: &FakeDevices, settings: VoiceSettings) -> VoiceController<FakeDevices> {
    VoiceController::new(devices.clone(), settings)
}

fn voice_controller(devices: &FakeDevices) -> VoiceController<FakeDevices> {
    let mut controller = controller_with(devices, VoiceSettings::default());
    controller.toggle_voice();
    controller
}

#[test]
fn final_capture_emits_one_utterance_and_returns_to_idle() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.press_mic(false);
    let capture = devices.last_capture();

    devices.push(DeviceEvent::CaptureInterim {
        capture,
        text: "hel".into(),
    });
    controller.poll();
    assert_eq!(controller.status_text(false), "Listening... hel");
    assert_eq!(controller.take_utterance(), None);

    devices.push(DeviceEvent::CaptureFinal {
        capture,
        text: "  hello  ".into(),
    });
    controller.poll();
    assert_eq!(controller.take_utterance().as_deref(), Some("hello"));
    assert_eq!(controller.take_utterance(), None);
    assert_eq!(controller.session().phase(), VoicePhase::Idle);
    assert_eq!(controller.session().mode(), VoiceMode::Voice);
}

#[test]
fn unsupported_capture_keeps_text_mode_with_notice() {
    let devices = FakeDevices::default();
    devices.0.borrow_mut().unsupported = true;
    let mut controller = controller_with(&devices, VoiceSettings::default());
    controller.toggle_voice();
    assert!(!controller.is_voice_mode());
    assert!(controller.take_notice().is_some());
    assert_eq!(controller.take_notice(), None);
}

#[test]
fn assistant_reply_is_spoken_with_calm_settings_and_chosen_voice() {
    let devices = FakeDevices::default();
    devices.0.borrow_mut().voices = vec![
        VoiceHandle::new("English_(America)", "en-US"),
        VoiceHandle::new("Google US English", "en-US"),
    ];
    let mut controller = voice_controller(&devices);
    controller.on_message(&Message::assistant("**Welcome.** Ready?"), false);

    let spoken = devices.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "Welcome. Ready?");
    assert_eq!(spoken[0].rate, 1.0);
    assert_eq!(spoken[0].pitch, 0.8);
    assert_eq!(
        spoken[0].voice.as_ref().map(|voice| voice.name.as_str()),
        Some("Google US English")
    );
    assert_eq!(controller.status_text(false), "Interviewer is speaking...");
}

#[test]
fn new_reply_cancels_previous_playback_first() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.on_message(&Message::assistant("one"), false);
    controller.on_message(&Message::assistant("two"), false);

    let calls = devices.calls();
    let last_speak = calls
        .iter()
        .rposition(|call| matches!(call, Call::Speak(u) if u.text == "two"))
        .expect("second utterance spoken");
    assert_eq!(calls[last_speak - 1], Call::CancelPlayback);
}

#[test]
fn mic_press_during_playback_is_ignored() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.on_message(&Message::assistant("Question"), false);
    controller.press_mic(false);
    assert!(!devices
        .calls()
        .iter()
        .any(|call| matches!(call, Call::StartCapture(_))));
    assert!(controller.session().speaking());
    assert!(!controller.session().listening());
}

#[test]
fn playback_end_requires_explicit_mic_press() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.on_message(&Message::assistant("Question"), false);
    let utterance = devices.spoken()[0].id;
    devices.push(DeviceEvent::PlaybackStarted { utterance });
    devices.push(DeviceEvent::PlaybackFinished { utterance });
    controller.poll();

    assert_eq!(controller.session().phase(), VoicePhase::Idle);
    assert!(!devices
        .calls()
        .iter()
        .any(|call| matches!(call, Call::StartCapture(_))));
    assert_eq!(controller.status_text(false), "Press Ctrl+R to speak");

    controller.press_mic(false);
    assert!(controller.session().listening());
}

#[test]
fn failed_playback_returns_to_idle() {
    let devices = FakeDevices::default();
    devices.0.borrow_mut().fail_speak = true;
    let mut controller = voice_controller(&devices);
    controller.on_message(&Message::assistant("Hello"), false);
    assert_eq!(controller.session().phase(), VoicePhase::Idle);
}

#[test]
fn failed_capture_start_returns_to_idle_without_notice() {
    let devices = FakeDevices::default();
    devices.0.borrow_mut().fail_capture = true;
    let mut controller = voice_controller(&devices);
    controller.press_mic(false);
    assert_eq!(controller.session().phase(), VoicePhase::Idle);
    assert_eq!(controller.take_notice(), None);
}

#[test]
fn pressing_mic_again_stops_capture() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.press_mic(false);
    controller.press_mic(false);
    assert_eq!(controller.session().phase(), VoicePhase::Idle);
    assert_eq!(devices.calls().last(), Some(&Call::StopCapture));
}

#[test]
fn listen_timeout_stops_capture_when_configured() {
    let devices = FakeDevices::default();
    let settings = VoiceSettings {
        listen_timeout: Some(Duration::from_millis(1)),
        ..VoiceSettings::default()
    };
    let mut controller = controller_with(&devices, settings);
    controller.toggle_voice();
    controller.press_mic(false);
    std::thread::sleep(Duration::from_millis(5));
    controller.poll();
    assert_eq!(controller.session().phase(), VoicePhase::Idle);
}

#[test]
fn listening_is_unbounded_without_timeout() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.press_mic(false);
    std::thread::sleep(Duration::from_millis(5));
    controller.poll();
    assert!(controller.session().listening());
}

#[test]
fn catalog_change_reselects_voice() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    assert_eq!(controller.session().chosen_voice(), None);

    devices.0.borrow_mut().voices = vec![VoiceHandle::new("Samantha", "en-US")];
    devices.push(DeviceEvent::VoicesChanged);
    controller.poll();
    assert_eq!(
        controller.session().chosen_voice().map(|voice| voice.name.as_str()),
        Some("Samantha")
    );
}

#[test]
fn teardown_silences_devices_and_drops_queued_utterances() {
    let devices = FakeDevices::default();
    let mut controller = voice_controller(&devices);
    controller.press_mic(false);
    let capture = devices.last_capture();
    devices.push(DeviceEvent::CaptureFinal {
        capture,
        text: "late answer".into(),
    });
    controller.poll();
    controller.teardown();

    assert!(!controller.is_voice_mode());
    assert_eq!(controller.take_utterance(), None);
    let calls = devices.calls();
    assert!(calls.ends_with(&[Call::CancelPlayback, Call::StopCapture]));
}

#[test]
fn busy_status_reads_thinking() {
    let devices = FakeDevices::default();
    let controller = voice_controller(&devices);
    assert_eq!(controller.status_text(true), "Thinking...");
}
