use super::defaults::{
    FORBIDDEN_COMMAND_CHARS, MAX_CASE_FILE_BYTES, MAX_COMMAND_BYTES, MAX_LISTEN_TIMEOUT_MS,
    MAX_SPEECH_PITCH, MAX_SPEECH_RATE, MIN_SPEECH_RATE,
};
use super::{AppConfig, VoiceSettings};
use crate::turn::StartRequest;
use anyhow::{bail, Context, Result};
use std::{fs, path::Path, time::Duration};

impl AppConfig {
    /// Check CLI values and normalize free-form strings.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_SPEECH_RATE..=MAX_SPEECH_RATE).contains(&self.speech_rate) {
            bail!(
                "--speech-rate must be between {MIN_SPEECH_RATE} and {MAX_SPEECH_RATE}, got {}",
                self.speech_rate
            );
        }
        if !(0.0..=MAX_SPEECH_PITCH).contains(&self.speech_pitch) {
            bail!(
                "--speech-pitch must be between 0.0 and {MAX_SPEECH_PITCH}, got {}",
                self.speech_pitch
            );
        }
        if let Some(timeout) = self.listen_timeout_ms {
            if timeout == 0 || timeout > MAX_LISTEN_TIMEOUT_MS {
                bail!(
                    "--listen-timeout-ms must be between 1 and {MAX_LISTEN_TIMEOUT_MS}, got {timeout}"
                );
            }
        }

        self.voice_lang = validate_locale(&self.voice_lang)?;

        sanitize_command(&self.service_cmd, "--service-cmd")?;
        sanitize_command(&self.stt_cmd, "--stt-cmd")?;
        sanitize_command(&self.tts_cmd, "--tts-cmd")?;
        sanitize_command(&self.voices_cmd, "--voices-cmd")?;

        if let Some(voice) = &self.voice {
            let trimmed = voice.trim();
            if trimmed.is_empty() {
                bail!("--voice must not be empty");
            }
            self.voice = Some(trimmed.to_string());
        }

        let starts = [
            self.topic.is_some(),
            self.case_type.is_some(),
            self.case_file.is_some(),
        ];
        if starts.iter().filter(|set| **set).count() > 1 {
            bail!("--topic, --case-type and --case-file are mutually exclusive");
        }
        if let Some(topic) = &self.topic {
            if topic.trim().is_empty() {
                bail!("--topic must not be empty");
            }
        }
        if let Some(case_type) = &self.case_type {
            if case_type.trim().is_empty() {
                bail!("--case-type must not be empty");
            }
        }
        if let Some(path) = &self.case_file {
            let metadata = fs::metadata(path)
                .with_context(|| format!("failed to inspect --case-file '{}'", path.display()))?;
            if !metadata.is_file() {
                bail!("--case-file '{}' is not a file", path.display());
            }
            if metadata.len() > MAX_CASE_FILE_BYTES {
                bail!(
                    "--case-file '{}' exceeds {MAX_CASE_FILE_BYTES} bytes",
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// Snapshot the voice-related CLI settings for the controller.
    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            lang: self.voice_lang.clone(),
            rate: self.speech_rate,
            pitch: self.speech_pitch,
            listen_timeout: self.listen_timeout_ms.map(Duration::from_millis),
            preferred_voice: self.voice.clone(),
        }
    }

    /// Interview start requested on the command line, if any.
    pub fn start_request(&self) -> Result<Option<StartRequest>> {
        if let Some(topic) = &self.topic {
            return Ok(Some(StartRequest::Topic(topic.trim().to_string())));
        }
        if let Some(case_type) = &self.case_type {
            return Ok(Some(StartRequest::GeneratedCase(
                case_type.trim().to_string(),
            )));
        }
        if let Some(path) = &self.case_file {
            return read_case_file(path).map(|text| Some(StartRequest::UploadedCase(text)));
        }
        Ok(None)
    }
}

/// Load plain-text case material for an uploaded-case interview.
pub fn read_case_file(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read case file '{}'", path.display()))?;
    if text.trim().is_empty() {
        bail!("case file '{}' is empty", path.display());
    }
    Ok(text)
}

/// Accept `ll`, `ll-RR` or `ll_RR` style locale tags; normalizes `_` to `-`.
pub(super) fn validate_locale(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("--voice-lang must not be empty");
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        bail!("--voice-lang must contain only alphanumeric characters or '-'/'_' separators");
    }
    let normalized = trimmed.replace('_', "-");
    let primary = normalized.split('-').next().unwrap_or("");
    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|ch| ch.is_ascii_alphabetic()) {
        bail!("--voice-lang must start with a 2-3 letter language code, got '{trimmed}'");
    }
    if normalized.split('-').any(str::is_empty) {
        bail!("--voice-lang has an empty subtag: '{trimmed}'");
    }
    Ok(normalized)
}

/// Split a command line into argv and reject values we should not hand to a spawner.
pub(crate) fn sanitize_command(value: &str, flag: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if trimmed.len() > MAX_COMMAND_BYTES {
        bail!("{flag} exceeds {MAX_COMMAND_BYTES} bytes");
    }
    if trimmed
        .chars()
        .any(|ch| FORBIDDEN_COMMAND_CHARS.contains(&ch))
    {
        bail!("{flag} must not contain control characters");
    }
    let argv = shell_words::split(trimmed)
        .with_context(|| format!("failed to parse {flag} '{trimmed}'"))?;
    let Some(program) = argv.first() else {
        bail!("{flag} cannot be empty");
    };
    let path = Path::new(program);
    if path.is_absolute() || program.contains(std::path::MAIN_SEPARATOR) {
        let metadata = fs::metadata(path)
            .with_context(|| format!("failed to inspect {flag} program '{program}'"))?;
        if !metadata.is_file() {
            bail!("{flag} program '{program}' is not a file");
        }
    }
    Ok(argv)
}
