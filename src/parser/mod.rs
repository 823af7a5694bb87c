pub mod markup;
pub mod quotes;
pub mod sections;

use crate::dump::Page;
use quotes::Quote;

/// Two-pass pipeline: wikitext → author segments → markup-stripped triples.
pub fn process_page(page: &Page) -> Vec<Quote> {
    sections::segment_page(&page.text)
        .iter()
        .flat_map(quotes::extract_quotes)
        .collect()
}

// ── Tests ──
