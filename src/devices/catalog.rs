use crate::config::{sanitize_command, AppConfig};
use crate::lock_or_recover;
use crate::log_debug;
use crate::voice::{DeviceEvent, VoiceHandle};
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Sender;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// Parse voice listings. Understands the `espeak --voices` table (priority, language,
/// age/gender, name, file) and plain `locale name` lines.
pub fn parse_voice_table(output: &str) -> Vec<VoiceHandle> {
    let mut voices = Vec::new();
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };
        if first.eq_ignore_ascii_case("pty") || first.starts_with('#') {
            continue;
        }
        if first.chars().all(|ch| ch.is_ascii_digit()) {
            if tokens.len() >= 4 {
                voices.push(VoiceHandle::new(tokens[3], tokens[1].replace('_', "-")));
            }
            continue;
        }
        if tokens.len() >= 2 {
            voices.push(VoiceHandle::new(
                tokens[1..].join(" "),
                first.replace('_', "-"),
            ));
        }
    }
    voices
}

/// Run the listing command and parse its stdout.
pub(crate) fn list_voices_blocking(argv: &[String]) -> Result<Vec<VoiceHandle>> {
    let Some(program) = argv.first() else {
        bail!("voice listing command is empty");
    };
    let output = Command::new(program)
        .args(&argv[1..])
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to run voice listing command '{program}'"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "voice listing command failed with status {}",
            output.status
        ));
    }
    Ok(parse_voice_table(&String::from_utf8_lossy(&output.stdout)))
}

/// Lazily loaded voice catalog. The first request starts a background listing and
/// returns nothing; `VoicesChanged` fires once the list is ready.
pub struct VoiceCatalog {
    argv: Vec<String>,
    cache: Arc<Mutex<Option<Vec<VoiceHandle>>>>,
    loading: bool,
}

impl VoiceCatalog {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            cache: Arc::new(Mutex::new(None)),
            loading: false,
        }
    }

    pub fn voices(&mut self, events: &Sender<DeviceEvent>) -> Vec<VoiceHandle> {
        if let Some(voices) = lock_or_recover(&self.cache, "voice catalog").as_ref() {
            return voices.clone();
        }
        if !self.loading {
            self.loading = true;
            let argv = self.argv.clone();
            let cache = Arc::clone(&self.cache);
            let events = events.clone();
            thread::spawn(move || {
                let voices = list_voices_blocking(&argv).unwrap_or_else(|err| {
                    log_debug(&format!("voice listing failed: {err:#}"));
                    Vec::new()
                });
                log_debug(&format!("voice catalog loaded ({} voices)", voices.len()));
                *lock_or_recover(&cache, "voice catalog") = Some(voices);
                let _ = events.send(DeviceEvent::VoicesChanged);
            });
        }
        Vec::new()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(sanitize_command(&config.voices_cmd, "--voices-cmd")?))
    }

    /// Synchronous listing for `--list-voices`.
    pub fn list_now(&self) -> Result<Vec<VoiceHandle>> {
        list_voices_blocking(&self.argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    const ESPEAK_TABLE: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/M      English_(Great_Britain) gmw/en           (en 2)
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";

    #[test]
    fn parses_espeak_table() {
        let voices = parse_voice_table(ESPEAK_TABLE);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[2], VoiceHandle::new("English_(America)", "en-us"));
        assert_eq!(voices[1].locale, "en-gb");
    }

    #[test]
    fn parses_locale_name_lines() {
        let voices = parse_voice_table("en_US Google US English\n\nde-DE Anna\nsolo\n");
        assert_eq!(
            voices,
            vec![
                VoiceHandle::new("Google US English", "en-US"),
                VoiceHandle::new("Anna", "de-DE"),
            ]
        );
    }

    #[test]
    fn empty_command_is_an_error() {
        assert!(list_voices_blocking(&[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn background_listing_fills_cache_and_notifies() {
        let mut catalog = VoiceCatalog::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'en-US Samantha'".to_string(),
        ]);
        let (tx, rx) = unbounded();
        assert!(catalog.voices(&tx).is_empty());
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).expect("catalog event"),
            DeviceEvent::VoicesChanged
        );
        assert_eq!(
            catalog.voices(&tx),
            vec![VoiceHandle::new("Samantha", "en-US")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn failed_listing_yields_empty_catalog() {
        let catalog = VoiceCatalog::new(vec!["false".to_string()]);
        assert!(catalog.list_now().is_err());
    }
}
