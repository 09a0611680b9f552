//! Strips display markup so text can be handed to a speech synthesizer.

use regex::Regex;
use std::sync::OnceLock;

/// Remove every `*` and any `- ` list marker at the start of a line.
pub fn clean(content: &str) -> String {
    static LIST_MARKER_RE: OnceLock<Regex> = OnceLock::new();
    let re = LIST_MARKER_RE
        .get_or_init(|| Regex::new(r"(?m)^- ").expect("list marker regex should compile"));
    let without_emphasis: String = content.chars().filter(|ch| *ch != '*').collect();
    re.replace_all(&without_emphasis, "").into_owned()
}
