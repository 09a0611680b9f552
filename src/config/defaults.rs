pub const DEFAULT_SERVICE_CMD: &str = "caseterm-service";
pub const DEFAULT_STT_CMD: &str = "caseterm-stt";
pub const DEFAULT_TTS_CMD: &str = "espeak-ng";
pub const DEFAULT_VOICES_CMD: &str = "espeak-ng --voices";
pub const DEFAULT_VOICE_LANG: &str = "en-US";

/// Normal speaking pace.
pub const DEFAULT_SPEECH_RATE: f32 = 1.0;
/// Slightly lowered pitch for a calmer interviewer tone.
pub const DEFAULT_SPEECH_PITCH: f32 = 0.8;

pub(super) const MIN_SPEECH_RATE: f32 = 0.1;
pub(super) const MAX_SPEECH_RATE: f32 = 10.0;
pub(super) const MAX_SPEECH_PITCH: f32 = 2.0;
pub(super) const MAX_LISTEN_TIMEOUT_MS: u64 = 600_000;
pub(super) const MAX_CASE_FILE_BYTES: u64 = 512 * 1024;
pub(super) const MAX_COMMAND_BYTES: usize = 4096;
pub(super) const FORBIDDEN_COMMAND_CHARS: &[char] = &['\n', '\r', '\0'];
