//! Medicine names and display segments from assistant replies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Most quick-search actions shown under one reply.
pub const MAX_QUICK_ACTIONS: usize = 3;

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern is valid"));

/// Every `**name**` in `text`, in order of appearance.
pub fn extract_medicine_names(text: &str) -> Vec<String> {
    BOLD.captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// The names that get a quick-search action.
pub fn quick_actions(names: &[String]) -> &[String] {
    &names[..names.len().min(MAX_QUICK_ACTIONS)]
}

/// Piece of a reply for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Segment {
    Plain(String),
    Bold(String),
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain(text) | Segment::Bold(text) => text,
        }
    }
}

/// Split `text` into plain and bold runs. Empty plain runs are dropped.
pub fn format_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in BOLD.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Plain(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Bold(inner.as_str().to_string()));
        last = whole.end();
    }

    if last < text.len() {
        segments.push(Segment::Plain(text[last..].to_string()));
    }
    segments
}
