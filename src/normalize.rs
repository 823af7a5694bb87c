use std::collections::HashSet;

use crate::parser::quotes::Quote;

/// Run-scoped duplicate tracker keyed on the canonicalized
/// (author, quote, source) triple. Built fresh for every pipeline run and
/// owned by the extraction driver; nothing persists between runs.
pub struct DedupSet {
    seen: HashSet<(String, String, Option<String>)>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }

    /// Records the triple's canonical key. Returns true the first time a key
    /// is seen; that occurrence's display text is the one worth keeping.
    pub fn insert(&mut self, quote: &Quote) -> bool {
        let key = (
            normalize_key(&quote.author),
            normalize_key(&quote.text),
            quote.source.as_deref().map(normalize_key),
        );
        self.seen.insert(key)
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical dedup form: lower-cased, inner whitespace collapsed to single
/// spaces, leading and trailing punctuation trimmed.
pub fn normalize_key(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

// ── Tests ──
