//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    DEFAULT_SERVICE_CMD, DEFAULT_SPEECH_PITCH, DEFAULT_SPEECH_RATE, DEFAULT_STT_CMD,
    DEFAULT_TTS_CMD, DEFAULT_VOICES_CMD, DEFAULT_VOICE_LANG,
};
pub use validation::read_case_file;
pub(crate) use validation::sanitize_command;

/// CLI options for the caseterm interview TUI. Validated values keep spawned helpers safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "caseterm - voice-enabled case interview practice", author, version)]
pub struct AppConfig {
    /// Command that answers interview requests (JSON on stdin, JSON on stdout)
    #[arg(long = "service-cmd", env = "CASETERM_SERVICE_CMD", default_value = DEFAULT_SERVICE_CMD)]
    pub service_cmd: String,

    /// Speech-to-text command emitting JSON transcript lines
    #[arg(long = "stt-cmd", env = "CASETERM_STT_CMD", default_value = DEFAULT_STT_CMD)]
    pub stt_cmd: String,

    /// Text-to-speech command; the utterance is written to its stdin
    #[arg(long = "tts-cmd", env = "CASETERM_TTS_CMD", default_value = DEFAULT_TTS_CMD)]
    pub tts_cmd: String,

    /// Command listing installed synthesizer voices
    #[arg(long = "voices-cmd", env = "CASETERM_VOICES_CMD", default_value = DEFAULT_VOICES_CMD)]
    pub voices_cmd: String,

    /// Locale used for capture and preferred voice selection
    #[arg(long = "voice-lang", default_value = DEFAULT_VOICE_LANG)]
    pub voice_lang: String,

    /// Force a specific synthesizer voice by name
    #[arg(long = "voice")]
    pub voice: Option<String>,

    /// Playback rate passed to the synthesizer (1.0 = normal)
    #[arg(long = "speech-rate", default_value_t = DEFAULT_SPEECH_RATE)]
    pub speech_rate: f32,

    /// Playback pitch passed to the synthesizer (1.0 = default, lower is calmer)
    #[arg(long = "speech-pitch", default_value_t = DEFAULT_SPEECH_PITCH)]
    pub speech_pitch: f32,

    /// Stop listening after this many milliseconds without a final transcript
    #[arg(long = "listen-timeout-ms")]
    pub listen_timeout_ms: Option<u64>,

    /// Start an interview on this topic right away
    #[arg(long = "topic")]
    pub topic: Option<String>,

    /// Start an interview on a generated case of this type
    #[arg(long = "case-type")]
    pub case_type: Option<String>,

    /// Start an interview on the case text stored in this file
    #[arg(long = "case-file")]
    pub case_file: Option<PathBuf>,

    /// Print detected synthesizer voices and exit
    #[arg(long = "list-voices", default_value_t = false)]
    pub list_voices: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "CASETERM_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "CASETERM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging message/transcript snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "CASETERM_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

/// Playback and capture parameters handed to the voice controller.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub listen_timeout: Option<Duration>,
    pub preferred_voice: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            lang: DEFAULT_VOICE_LANG.to_string(),
            rate: DEFAULT_SPEECH_RATE,
            pitch: DEFAULT_SPEECH_PITCH,
            listen_timeout: None,
            preferred_voice: None,
        }
    }
}
