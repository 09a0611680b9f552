use crate::log_debug;
use crate::voice::{DeviceEvent, Utterance};
use anyhow::{bail, Context, Result};
use crossbeam_channel::Sender;
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;

/// espeak speaks 175 words per minute at its default rate.
const ESPEAK_BASE_WPM: f32 = 175.0;
/// espeak pitch runs 0..=99 with 50 as the default.
const ESPEAK_BASE_PITCH: f32 = 50.0;

fn is_espeak(program: &str) -> bool {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("espeak"))
}

/// Extra argv for the synthesizer. espeak gets native flags; other commands read the
/// `CASETERM_TTS_*` environment instead.
pub(crate) fn synth_args(program: &str, utterance: &Utterance) -> Vec<String> {
    if !is_espeak(program) {
        return Vec::new();
    }
    let wpm = (ESPEAK_BASE_WPM * utterance.rate).round().clamp(80.0, 500.0) as u32;
    let pitch = (ESPEAK_BASE_PITCH * utterance.pitch).round().clamp(0.0, 99.0) as u32;
    let mut args = vec![
        "-s".to_string(),
        wpm.to_string(),
        "-p".to_string(),
        pitch.to_string(),
    ];
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.name.clone());
    }
    args.push("--stdin".to_string());
    args
}

/// Plays utterances through a synthesizer command; one child at a time.
pub struct CommandSpeaker {
    argv: Vec<String>,
    current: Option<(u64, Child)>,
}

impl CommandSpeaker {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            current: None,
        }
    }

    pub fn speak(&mut self, utterance: &Utterance, events: &Sender<DeviceEvent>) -> Result<()> {
        self.cancel();
        let Some(program) = self.argv.first() else {
            bail!("speech synthesis command is empty");
        };
        let mut command = Command::new(program);
        command
            .args(&self.argv[1..])
            .args(synth_args(program, utterance))
            .env("CASETERM_TTS_RATE", utterance.rate.to_string())
            .env("CASETERM_TTS_PITCH", utterance.pitch.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(voice) = &utterance.voice {
            command.env("CASETERM_TTS_VOICE", &voice.name);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start speech synthesis command '{program}'"))?;

        let mut stdin = child
            .stdin
            .take()
            .context("failed to open speech synthesis stdin")?;
        let text = utterance.text.clone();
        thread::spawn(move || {
            let _ = stdin.write_all(text.as_bytes());
            let _ = stdin.write_all(b"\n");
        });

        let _ = events.send(DeviceEvent::PlaybackStarted {
            utterance: utterance.id,
        });
        self.current = Some((utterance.id, child));
        Ok(())
    }

    /// Report the current utterance once its synthesizer has exited.
    pub fn poll_finished(&mut self) -> Option<DeviceEvent> {
        let (id, child) = self.current.as_mut()?;
        let id = *id;
        match child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) => {
                if !status.success() {
                    log_debug(&format!("speech synthesis exited with {status}"));
                }
                self.current = None;
                Some(DeviceEvent::PlaybackFinished { utterance: id })
            }
            Err(err) => {
                log_debug(&format!("speech synthesis wait failed: {err}"));
                self.current = None;
                Some(DeviceEvent::PlaybackFinished { utterance: id })
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some((id, mut child)) = self.current.take() {
            let _ = child.kill();
            let _ = child.wait();
            log_debug(&format!("playback {id} cancelled"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceHandle;
    use crossbeam_channel::unbounded;
    use std::time::{Duration, Instant};

    fn utterance(id: u64, text: &str) -> Utterance {
        Utterance {
            id,
            text: text.to_string(),
            voice: Some(VoiceHandle::new("English_(America)", "en-US")),
            rate: 1.0,
            pitch: 0.8,
        }
    }

    #[test]
    fn espeak_gets_rate_pitch_and_voice_flags() {
        let args = synth_args("/usr/bin/espeak-ng", &utterance(1, "Hi"));
        assert_eq!(
            args,
            vec!["-s", "175", "-p", "40", "-v", "English_(America)", "--stdin"]
        );
    }

    #[test]
    fn other_synthesizers_get_no_extra_flags() {
        assert!(synth_args("say", &utterance(1, "Hi")).is_empty());
    }

    #[test]
    fn espeak_values_are_clamped() {
        let mut fast = utterance(1, "Hi");
        fast.rate = 10.0;
        fast.pitch = 2.0;
        fast.voice = None;
        assert_eq!(synth_args("espeak", &fast), vec!["-s", "500", "-p", "99", "--stdin"]);
    }

    #[test]
    fn empty_command_fails_to_speak() {
        let mut speaker = CommandSpeaker::new(Vec::new());
        let (tx, _rx) = unbounded();
        assert!(speaker.speak(&utterance(1, "Hi"), &tx).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn reports_start_and_finish() {
        let mut speaker = CommandSpeaker::new(vec!["cat".to_string()]);
        let (tx, rx) = unbounded();
        speaker.speak(&utterance(4, "Hello"), &tx).expect("speak");
        assert_eq!(
            rx.try_recv().expect("started"),
            DeviceEvent::PlaybackStarted { utterance: 4 }
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = speaker.poll_finished() {
                assert_eq!(event, DeviceEvent::PlaybackFinished { utterance: 4 });
                break;
            }
            assert!(Instant::now() < deadline, "playback never finished");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(speaker.poll_finished(), None);
    }

    #[cfg(unix)]
    #[test]
    fn cancel_discards_current_utterance() {
        let mut speaker = CommandSpeaker::new(vec!["sleep".to_string(), "30".to_string()]);
        let (tx, _rx) = unbounded();
        speaker.speak(&utterance(9, "Hello"), &tx).expect("speak");
        speaker.cancel();
        assert_eq!(speaker.poll_finished(), None);
    }
}
