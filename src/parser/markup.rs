use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static PIPED_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\[\]|]*\|([^\[\]]*)\]\]").unwrap());
static BARE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]|]*)\]\]").unwrap());
static LABELED_EXTERNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:https?|ftp)://[^\s\]]*\s+([^\]]*)\]").unwrap());
static BARE_EXTERNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:https?|ftp)://[^\s\]]*\]").unwrap());
static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'{2,}").unwrap());
static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap());

/// One markup class rewritten toward plain text.
struct Rewrite {
    pattern: &'static LazyLock<Regex>,
    replacement: &'static str,
}

/// Earlier rules take priority: after any rule fires, the sweep restarts
/// from the top so link resolution always runs before bracket cleanup.
/// Every rule strictly shrinks its match, so the loop terminates; rerunning
/// the whole pass on its own output is a no-op.
static REWRITES: &[Rewrite] = &[
    // [[target|label]] -> label, [[target]] -> target
    Rewrite { pattern: &PIPED_LINK_RE, replacement: "$1" },
    Rewrite { pattern: &BARE_LINK_RE, replacement: "$1" },
    // [url label] -> label, [url] -> gone, [other] -> other
    Rewrite { pattern: &LABELED_EXTERNAL_RE, replacement: "$1" },
    Rewrite { pattern: &BARE_EXTERNAL_RE, replacement: "" },
    Rewrite { pattern: &BRACKETED_RE, replacement: "$1" },
    // '''bold''' / ''italic'' delimiters
    Rewrite { pattern: &EMPHASIS_RE, replacement: "" },
    // {{template}} calls are rendering directives, not quote content
    Rewrite { pattern: &TEMPLATE_RE, replacement: "" },
    Rewrite { pattern: &COMMENT_RE, replacement: "" },
    Rewrite { pattern: &TAG_RE, replacement: "" },
];

/// Strip wiki markup from one line of text, collapsing whitespace at the end.
pub fn strip_markup(raw: &str) -> String {
    let mut text = decode_entities(raw);
    'sweep: loop {
        for rule in REWRITES {
            let next = match rule.pattern.replace_all(&text, rule.replacement) {
                Cow::Owned(next) => next,
                Cow::Borrowed(_) => continue,
            };
            text = next;
            continue 'sweep;
        }
        break;
    }
    collapse_whitespace(&text)
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piped_link_keeps_label() {
        assert_eq!(strip_markup("[[Wisdom|wise]] words"), "wise words");
    }

    #[test]
    fn bare_link_keeps_target() {
        assert_eq!(strip_markup("see [[Mark Twain]]"), "see Mark Twain");
    }

    #[test]
    fn nested_link_resolves_inner_first() {
        assert_eq!(strip_markup("[[a|x [[b]] y]]"), "x b y");
    }

    #[test]
    fn labeled_external_link_keeps_label() {
        assert_eq!(
            strip_markup("[https://example.org the example site]"),
            "the example site"
        );
    }

    #[test]
    fn bare_external_link_removed() {
        assert_eq!(strip_markup("ref [https://example.org] here"), "ref here");
    }

    #[test]
    fn plain_bracket_keeps_inner() {
        assert_eq!(strip_markup("quoted [sic] text"), "quoted sic text");
    }

    #[test]
    fn emphasis_delimiters_removed() {
        assert_eq!(strip_markup("'''bold''' and ''italic''"), "bold and italic");
        assert_eq!(strip_markup("'''''both'''''"), "both");
    }

    #[test]
    fn apostrophes_survive() {
        assert_eq!(strip_markup("''Pudd'nhead Wilson''"), "Pudd'nhead Wilson");
    }

    #[test]
    fn templates_removed_entirely() {
        assert_eq!(strip_markup("{{citation needed}}"), "");
        assert_eq!(strip_markup("before {{cite|a|b}} after"), "before after");
    }

    #[test]
    fn nested_templates_removed() {
        assert_eq!(strip_markup("x {{outer {{inner}} tail}} y"), "x y");
    }

    #[test]
    fn html_tags_removed_text_kept() {
        assert_eq!(strip_markup("a <small>note</small> here"), "a note here");
        assert_eq!(strip_markup("line<br/>break"), "linebreak");
    }

    #[test]
    fn html_comments_removed() {
        assert_eq!(strip_markup("keep <!-- drop this --> keep"), "keep keep");
    }

    #[test]
    fn entities_decoded() {
        assert_eq!(strip_markup("&quot;x&quot; &amp; y"), "\"x\" & y");
    }

    #[test]
    fn whitespace_collapsed_and_trimmed() {
        assert_eq!(strip_markup("  a \t b\u{a0}c  "), "a b c");
    }

    #[test]
    fn stripping_is_idempotent() {
        let inputs = [
            "[[Wisdom|wise]] words and {{tmpl}} ''more'' [https://x.org label]",
            "plain text with an apostrophe in Pudd'nhead",
            "\"already quoted\" <b>tagged</b>",
        ];
        for input in inputs {
            let once = strip_markup(input);
            assert_eq!(strip_markup(&once), once, "not idempotent for {input:?}");
        }
    }
}
