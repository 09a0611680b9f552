//! Turns raw interviewer text into display blocks.
//!
//! A small subset of markdown is understood: `- `/`* ` list items, blank-line
//! paragraph breaks and `**` emphasis. Anything else is shown as plain paragraph text.

use serde::Serialize;

const EMPHASIS_MARKER: &str = "**";
const LIST_MARKERS: [&str; 2] = ["- ", "* "];

/// A run of text inside a paragraph or list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub emphasized: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// One renderable unit derived from a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayBlock {
    Paragraph { spans: Vec<Span> },
    ListBlock { items: Vec<Vec<Span>> },
}

/// Render `content` into blocks. Never fails; unknown syntax stays as text.
pub fn render(content: &str) -> Vec<DisplayBlock> {
    let mut blocks = Vec::new();
    let mut items: Vec<Vec<Span>> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(item) = strip_list_marker(trimmed) {
            items.push(split_emphasis(item));
            continue;
        }
        // Any non-item line, blank ones included, closes the open list.
        flush_list(&mut items, &mut blocks);
        if trimmed.is_empty() {
            continue;
        }
        blocks.push(DisplayBlock::Paragraph {
            spans: split_emphasis(trimmed),
        });
    }
    flush_list(&mut items, &mut blocks);

    blocks
}

fn strip_list_marker(trimmed: &str) -> Option<&str> {
    LIST_MARKERS
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
}

fn flush_list(items: &mut Vec<Vec<Span>>, blocks: &mut Vec<DisplayBlock>) {
    if items.is_empty() {
        return;
    }
    blocks.push(DisplayBlock::ListBlock {
        items: std::mem::take(items),
    });
}

/// Odd segments between `**` markers are emphasized. A dangling marker is kept
/// verbatim as plain text.
fn split_emphasis(line: &str) -> Vec<Span> {
    let segments: Vec<&str> = line.split(EMPHASIS_MARKER).collect();
    let dangling = segments.len() % 2 == 0;
    let last = segments.len() - 1;
    let mut spans: Vec<Span> = Vec::with_capacity(segments.len());

    for (idx, segment) in segments.iter().enumerate() {
        if dangling && idx == last {
            let literal = format!("{EMPHASIS_MARKER}{segment}");
            match spans.last_mut() {
                Some(prev) if !prev.emphasized => prev.text.push_str(&literal),
                _ => spans.push(Span::plain(literal)),
            }
            continue;
        }
        if segment.is_empty() {
            continue;
        }
        spans.push(Span {
            text: (*segment).to_string(),
            emphasized: idx % 2 == 1,
        });
    }

    spans
}
