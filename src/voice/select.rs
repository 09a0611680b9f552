use super::VoiceHandle;

/// Name fragments that usually mark a higher-quality synthesizer voice.
const QUALITY_MARKERS: &[&str] = &["google", "natural", "neural", "premium", "enhanced"];

fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_ascii_lowercase()
}

fn primary_language(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

/// Pick a voice for `lang`: an explicitly requested name, then a high-quality voice of
/// the exact locale, then any voice of that locale, then any voice of the same
/// language, then whatever is first. `None` lets the device use its default.
pub fn select_voice(
    voices: &[VoiceHandle],
    lang: &str,
    preferred: Option<&str>,
) -> Option<VoiceHandle> {
    if let Some(name) = preferred {
        if let Some(voice) = voices
            .iter()
            .find(|voice| voice.name.eq_ignore_ascii_case(name.trim()))
        {
            return Some(voice.clone());
        }
    }

    let wanted = normalize_locale(lang);
    let wanted_primary = primary_language(&wanted).to_string();
    let exact = |voice: &&VoiceHandle| normalize_locale(&voice.locale) == wanted;
    let high_quality = |voice: &&VoiceHandle| {
        let name = voice.name.to_ascii_lowercase();
        QUALITY_MARKERS.iter().any(|marker| name.contains(marker))
    };

    voices
        .iter()
        .find(|voice| exact(voice) && high_quality(voice))
        .or_else(|| voices.iter().find(|voice| exact(voice)))
        .or_else(|| {
            voices.iter().find(|voice| {
                primary_language(&normalize_locale(&voice.locale)) == wanted_primary
            })
        })
        .or_else(|| voices.first())
        .cloned()
}
