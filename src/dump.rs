//! Streaming reader over a wiki XML export. Holds one page's fields plus the
//! parse buffer; never the whole corpus.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

/// One content entry of the export: human-readable title plus raw wikitext.
#[derive(Debug, Clone)]
pub struct Page {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum DumpError {
    /// One entry is structurally broken; the stream continues afterwards.
    #[error("malformed dump entry near byte {position}: {reason}")]
    MalformedInput { position: u64, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which child element of the current `<page>` is being accumulated.
#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Title,
    Ns,
    Text,
}

pub struct DumpReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    last_error_pos: u64,
    done: bool,
}

impl DumpReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DumpError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            last_error_pos: u64::MAX,
            done: false,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> DumpError {
        DumpError::MalformedInput {
            position: self.reader.buffer_position(),
            reason: reason.into(),
        }
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<Page, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut in_page = false;
        let mut field = Field::None;
        let mut title = String::new();
        let mut ns = String::new();
        let mut text = String::new();
        let mut redirect = false;

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = self.reader.buffer_position();
                    if position == self.last_error_pos {
                        // Not advancing; the rest of the stream is unreadable.
                        self.done = true;
                        return None;
                    }
                    self.last_error_pos = position;
                    return Some(Err(DumpError::MalformedInput {
                        position,
                        reason: e.to_string(),
                    }));
                }
            };

            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"page" => {
                        in_page = true;
                        field = Field::None;
                        title.clear();
                        ns.clear();
                        text.clear();
                        redirect = false;
                    }
                    b"title" if in_page => field = Field::Title,
                    b"ns" if in_page => field = Field::Ns,
                    b"text" if in_page => field = Field::Text,
                    b"redirect" if in_page => redirect = true,
                    _ => {}
                },
                Event::Empty(e) => {
                    if in_page && e.name().as_ref() == b"redirect" {
                        redirect = true;
                    }
                }
                Event::Text(e) => {
                    if let Some(target) = field_buf(field, &mut title, &mut ns, &mut text) {
                        match e.decode() {
                            Ok(t) => target.push_str(&t),
                            Err(err) => {
                                self.last_error_pos = self.reader.buffer_position();
                                return Some(Err(self.malformed(err.to_string())));
                            }
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(target) = field_buf(field, &mut title, &mut ns, &mut text) {
                        target.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::GeneralRef(e) => {
                    if let Some(target) = field_buf(field, &mut title, &mut ns, &mut text) {
                        if let Some(ch) = resolve_reference(e.as_ref()) {
                            target.push(ch);
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"title" | b"ns" | b"text" => field = Field::None,
                    b"page" if in_page => {
                        in_page = false;
                        if let Some(page) = content_page(&title, &ns, &text, redirect) {
                            return Some(Ok(page));
                        }
                    }
                    _ => {}
                },
                Event::Eof => {
                    self.done = true;
                    if in_page {
                        return Some(Err(self.malformed(format!("unterminated page {title:?}"))));
                    }
                    return None;
                }
                _ => {}
            }
        }
    }
}

fn field_buf<'a>(
    field: Field,
    title: &'a mut String,
    ns: &'a mut String,
    text: &'a mut String,
) -> Option<&'a mut String> {
    match field {
        Field::Title => Some(title),
        Field::Ns => Some(ns),
        Field::Text => Some(text),
        Field::None => None,
    }
}

/// Decode a general entity reference: the predefined XML set plus numeric
/// character references. Unknown references are dropped.
fn resolve_reference(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => {
            let code = u32::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?;
            char::from_u32(code)
        }
        [b'#', dec @ ..] => {
            let code: u32 = std::str::from_utf8(dec).ok()?.parse().ok()?;
            char::from_u32(code)
        }
        _ => None,
    }
}

/// Filter out entries that are not content pages: redirects, namespaced
/// pages, and pages without a text body.
fn content_page(title: &str, ns: &str, text: &str, redirect: bool) -> Option<Page> {
    let title = title.trim();
    if title.is_empty() || text.trim().is_empty() {
        return None;
    }
    if redirect || text.trim_start().to_ascii_uppercase().starts_with("#REDIRECT") {
        debug!(title, "skipping redirect page");
        return None;
    }
    if title.contains(':') || ns.trim().parse::<i64>().map(|n| n != 0).unwrap_or(false) {
        debug!(title, "skipping non-content page");
        return None;
    }
    Some(Page {
        title: title.to_string(),
        text: text.to_string(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str) -> Vec<Result<Page, DumpError>> {
        DumpReader::new(xml.as_bytes()).collect()
    }

    fn page_xml(title: &str, body: &str) -> String {
        format!(
            "<page><title>{title}</title><ns>0</ns><revision><text>{body}</text></revision></page>"
        )
    }

    #[test]
    fn yields_title_and_text() {
        let xml = format!("<mediawiki>{}</mediawiki>", page_xml("Mark Twain", "== Q ==\n* x"));
        let pages: Vec<Page> = read_all(&xml).into_iter().map(|p| p.unwrap()).collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Mark Twain");
        assert_eq!(pages[0].text, "== Q ==\n* x");
    }

    #[test]
    fn skips_redirect_element() {
        let xml = "<mediawiki><page><title>Alias</title><ns>0</ns>\
                   <redirect title=\"Target\"/>\
                   <revision><text>#REDIRECT [[Target]]</text></revision></page></mediawiki>";
        assert!(read_all(xml).is_empty());
    }

    #[test]
    fn skips_redirect_body_without_element() {
        let xml = format!("<mediawiki>{}</mediawiki>", page_xml("Alias", "#redirect [[Target]]"));
        assert!(read_all(&xml).is_empty());
    }

    #[test]
    fn skips_namespaced_titles() {
        let xml = format!("<mediawiki>{}</mediawiki>", page_xml("Category:People", "* x"));
        assert!(read_all(&xml).is_empty());
    }

    #[test]
    fn skips_nonzero_namespace() {
        let xml = "<mediawiki><page><title>Weird</title><ns>10</ns>\
                   <revision><text>* x</text></revision></page></mediawiki>";
        assert!(read_all(xml).is_empty());
    }

    #[test]
    fn skips_empty_text_body() {
        let xml = "<mediawiki><page><title>Empty</title><ns>0</ns>\
                   <revision><text></text></revision></page></mediawiki>";
        assert!(read_all(xml).is_empty());
        let xml = "<mediawiki><page><title>Empty</title><ns>0</ns>\
                   <revision><text/></revision></page></mediawiki>";
        assert!(read_all(xml).is_empty());
    }

    #[test]
    fn skips_metadata_entries() {
        let xml = format!(
            "<mediawiki><siteinfo><sitename>Wikiquote</sitename></siteinfo>{}</mediawiki>",
            page_xml("Kept", "* x")
        );
        let pages: Vec<Page> = read_all(&xml).into_iter().map(|p| p.unwrap()).collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Kept");
    }

    #[test]
    fn decodes_entities_in_text() {
        let xml = format!("<mediawiki>{}</mediawiki>", page_xml("AT&amp;T", "* a &amp; b"));
        let pages: Vec<Page> = read_all(&xml).into_iter().map(|p| p.unwrap()).collect();
        assert_eq!(pages[0].title, "AT&T");
        assert_eq!(pages[0].text, "* a & b");
    }

    #[test]
    fn unterminated_page_is_malformed_not_fatal() {
        let xml = format!("<mediawiki>{}<page><title>Broken</title>", page_xml("Good", "* x"));
        let items = read_all(&xml);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(DumpError::MalformedInput { .. })
        ));
    }

    #[test]
    fn fixture_dump_restartable_and_deterministic() {
        let path = "tests/fixtures/sample_dump.xml";
        let titles = || -> Vec<String> {
            DumpReader::open(path)
                .unwrap()
                .filter_map(|p| p.ok())
                .map(|p| p.title)
                .collect()
        };
        let first = titles();
        let second = titles();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
