use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::markup;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={1,6})\s*(.*?)\s*=+\s*$").unwrap());

/// The portion of a page attributed to one author heading.
#[derive(Debug, Clone)]
pub struct Segment {
    pub author: String,
    pub body: String,
}

/// Heading depth and inner text, if the line is a wiki heading.
pub fn heading_level(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING_RE.captures(line.trim())?;
    let level = caps.get(1).map(|m| m.as_str().len())?;
    let text = caps.get(2).map(|m| m.as_str())?;
    Some((level, text))
}

/// Split a page's wikitext into author-attributed segments.
///
/// A level-2 heading starts a segment named by its stripped heading text;
/// the body runs to the next heading of the same or shallower level. Deeper
/// headings stay inside the body. Lines before the first author heading are
/// page preamble and carry no attribution, so they are dropped, as are
/// segments whose heading strips to nothing.
pub fn segment_page(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut author: Option<String> = None;
    let mut body = String::new();

    for line in text.lines() {
        if let Some((level, heading)) = heading_level(line) {
            if level <= 2 {
                push_segment(&mut segments, author.take(), std::mem::take(&mut body));
                if level == 2 {
                    let name = markup::strip_markup(heading);
                    if name.is_empty() {
                        debug!("dropping segment with empty heading");
                    } else {
                        author = Some(name);
                    }
                }
                continue;
            }
        }
        if author.is_some() {
            body.push_str(line);
            body.push('\n');
        }
    }
    push_segment(&mut segments, author, body);

    segments
}

fn push_segment(segments: &mut Vec<Segment>, author: Option<String>, body: String) {
    if let Some(author) = author {
        segments.push(Segment { author, body });
    }
}

// ── Tests ──
