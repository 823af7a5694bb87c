use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::markup::strip_markup;
use super::sections::{heading_level, Segment};

/// Attribution lead-ins dropped from the front of a resolved source title.
static ATTRIBUTION_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:source:|~)\s*").unwrap());

/// One extracted (author, quote, source) triple.
#[derive(Debug, Clone)]
pub struct Quote {
    pub author: String,
    pub text: String,
    pub source: Option<String>,
}

/// Scan a segment's lines for quote bullets and resolve each one's source
/// from the attribution sub-bullets that follow it.
pub fn extract_quotes(segment: &Segment) -> Vec<Quote> {
    let lines: Vec<&str> = segment.body.lines().map(str::trim).collect();
    let mut quotes = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(raw) = candidate_text(line) else {
            continue;
        };
        let stripped = strip_markup(raw);
        let text = unwrap_enclosing_quotes(&stripped);
        if text.is_empty() {
            debug!(author = %segment.author, "bullet stripped to empty, dropping");
            continue;
        }
        let source = resolve_source(&lines[i + 1..], &segment.author);
        quotes.push(Quote {
            author: segment.author.clone(),
            text: text.to_string(),
            source,
        });
    }

    quotes
}

/// The bullet body if the line is a top-level quote bullet. Sub-bullets,
/// numbered lists, and definition-style continuations are not candidates.
fn candidate_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('*')?;
    if rest.starts_with(['*', '-', ':', '#']) {
        return None;
    }
    Some(rest)
}

/// The sub-bullet body if the line is an attribution one level below a quote.
fn attribution_text(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("**")
        .or_else(|| line.strip_prefix("*-"))?;
    if rest.starts_with(['*', '-']) {
        // deeper nesting carries secondary quotes, not citations
        return None;
    }
    Some(rest)
}

/// Find the originating work for a quote among the lines that follow it.
///
/// The scan stops at the next top-level bullet, heading, or end of segment.
/// The first recognized attribution line wins; further candidates within the
/// window are logged and ignored. No match is a normal outcome.
fn resolve_source(following: &[&str], author: &str) -> Option<String> {
    let mut found: Option<String> = None;
    let mut extras = 0usize;

    for line in following {
        if heading_level(line).is_some() || candidate_text(line).is_some() {
            break;
        }
        let Some(rest) = attribution_text(line) else {
            continue;
        };
        let stripped = strip_markup(rest);
        let title = ATTRIBUTION_KEYWORD_RE.replace(&stripped, "").trim().to_string();
        if title.is_empty() {
            continue;
        }
        if found.is_none() {
            found = Some(title);
        } else {
            extras += 1;
        }
    }

    if extras > 0 {
        debug!(author, extras, "multiple attribution lines, keeping the first");
    }
    found
}

/// Unwrap a candidate whose whole text sits inside one pair of double quotes.
fn unwrap_enclosing_quotes(text: &str) -> &str {
    let text = text.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|t| t.strip_suffix(close))
        {
            if !inner.is_empty() && !inner.contains(open) && !inner.contains(close) {
                return inner.trim();
            }
        }
    }
    text
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(body: &str) -> Segment {
        Segment {
            author: "Mark Twain".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn plain_bullet_becomes_quote() {
        let quotes = extract_quotes(&segment(
            "* \"The secret of getting ahead is getting started.\"\n",
        ));
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].author, "Mark Twain");
        assert_eq!(
            quotes[0].text,
            "The secret of getting ahead is getting started."
        );
        assert_eq!(quotes[0].source, None);
    }

    #[test]
    fn attribution_sub_bullet_resolves_source() {
        let quotes = extract_quotes(&segment(
            "* \"The secret of getting ahead is getting started.\"\n** ''Source: Pudd'nhead Wilson''\n",
        ));
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].source.as_deref(), Some("Pudd'nhead Wilson"));
    }

    #[test]
    fn tilde_attribution_recognized() {
        let quotes = extract_quotes(&segment("* a quote\n** ~ Following the Equator\n"));
        assert_eq!(quotes[0].source.as_deref(), Some("Following the Equator"));
    }

    #[test]
    fn dash_attribution_recognized() {
        let quotes = extract_quotes(&segment("* a quote\n*- Roughing It\n"));
        assert_eq!(quotes[0].source.as_deref(), Some("Roughing It"));
    }

    #[test]
    fn linked_attribution_stripped() {
        let quotes = extract_quotes(&segment("* a quote\n** [[Life on the Mississippi]]\n"));
        assert_eq!(quotes[0].source.as_deref(), Some("Life on the Mississippi"));
    }

    #[test]
    fn first_attribution_wins() {
        let quotes = extract_quotes(&segment("* a quote\n** First Book\n** Second Book\n"));
        assert_eq!(quotes[0].source.as_deref(), Some("First Book"));
    }

    #[test]
    fn attribution_does_not_leak_across_quotes() {
        let quotes = extract_quotes(&segment("* first quote\n* second quote\n** Only Book\n"));
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].source, None);
        assert_eq!(quotes[1].source.as_deref(), Some("Only Book"));
    }

    #[test]
    fn sub_bullets_are_not_quotes() {
        let quotes = extract_quotes(&segment("** just a citation line\n*: continuation\n"));
        assert!(quotes.is_empty());
    }

    #[test]
    fn numbered_lines_are_not_quotes() {
        let quotes = extract_quotes(&segment("# first\n# second\n"));
        assert!(quotes.is_empty());
    }

    #[test]
    fn bullet_stripping_to_empty_is_dropped() {
        let quotes = extract_quotes(&segment("* {{citation needed}}\n* real quote\n"));
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "real quote");
    }

    #[test]
    fn markup_stripped_from_quote_text() {
        let quotes = extract_quotes(&segment("* [[Wisdom|wise]] words\n"));
        assert_eq!(quotes[0].text, "wise words");
    }

    #[test]
    fn empty_attribution_is_no_source() {
        let quotes = extract_quotes(&segment("* a quote\n** {{cite}}\n"));
        assert_eq!(quotes[0].source, None);
    }

    #[test]
    fn partial_quote_pair_left_alone() {
        let quotes = extract_quotes(&segment("* \"Begins quoted\" but continues\n"));
        assert_eq!(quotes[0].text, "\"Begins quoted\" but continues");
    }
}
