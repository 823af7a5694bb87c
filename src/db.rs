use anyhow::Result;
use rusqlite::Connection;

use crate::records::QuoteRecord;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS authors (
            id    INTEGER PRIMARY KEY,
            name  TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quotes (
            id    INTEGER PRIMARY KEY,
            text  TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sources (
            id     INTEGER PRIMARY KEY,
            title  TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS attributed_to (
            id         INTEGER PRIMARY KEY,
            author_id  INTEGER NOT NULL REFERENCES authors(id),
            quote_id   INTEGER NOT NULL REFERENCES quotes(id),
            UNIQUE(author_id, quote_id)
        );
        CREATE INDEX IF NOT EXISTS idx_attributed_quote ON attributed_to(quote_id);

        CREATE TABLE IF NOT EXISTS appears_in (
            id         INTEGER PRIMARY KEY,
            quote_id   INTEGER NOT NULL REFERENCES quotes(id),
            source_id  INTEGER NOT NULL REFERENCES sources(id),
            UNIQUE(quote_id, source_id)
        );
        CREATE INDEX IF NOT EXISTS idx_appears_source ON appears_in(source_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS quote_fts
            USING fts5(text, content='quotes', content_rowid='id');
        ",
    )?;
    Ok(())
}

// ── Loading ──

pub struct LoadStats {
    pub records: usize,
    pub new_quotes: usize,
}

/// Upsert a batch of records into the graph. Every statement is
/// INSERT OR IGNORE, so re-loading the same records changes nothing.
pub fn load_records(
    conn: &Connection,
    records: &[QuoteRecord],
    batch_size: usize,
) -> Result<LoadStats> {
    let mut stats = LoadStats { records: 0, new_quotes: 0 };

    for chunk in records.chunks(batch_size.max(1)) {
        let tx = conn.unchecked_transaction()?;
        {
            let mut author_ins = tx.prepare("INSERT OR IGNORE INTO authors (name) VALUES (?1)")?;
            let mut author_sel = tx.prepare("SELECT id FROM authors WHERE name = ?1")?;
            let mut quote_ins = tx.prepare("INSERT OR IGNORE INTO quotes (text) VALUES (?1)")?;
            let mut quote_sel = tx.prepare("SELECT id FROM quotes WHERE text = ?1")?;
            let mut fts_ins = tx.prepare("INSERT INTO quote_fts (rowid, text) VALUES (?1, ?2)")?;
            let mut source_ins = tx.prepare("INSERT OR IGNORE INTO sources (title) VALUES (?1)")?;
            let mut source_sel = tx.prepare("SELECT id FROM sources WHERE title = ?1")?;
            let mut attr_ins = tx.prepare(
                "INSERT OR IGNORE INTO attributed_to (author_id, quote_id) VALUES (?1, ?2)",
            )?;
            let mut appear_ins = tx.prepare(
                "INSERT OR IGNORE INTO appears_in (quote_id, source_id) VALUES (?1, ?2)",
            )?;

            for record in chunk {
                author_ins.execute([&record.author])?;
                let author_id: i64 = author_sel.query_row([&record.author], |r| r.get(0))?;

                let inserted = quote_ins.execute([&record.quote])?;
                let quote_id: i64 = quote_sel.query_row([&record.quote], |r| r.get(0))?;
                if inserted > 0 {
                    fts_ins.execute(rusqlite::params![quote_id, record.quote])?;
                    stats.new_quotes += 1;
                }

                attr_ins.execute([author_id, quote_id])?;

                if let Some(title) = &record.source {
                    source_ins.execute([title])?;
                    let source_id: i64 = source_sel.query_row([title], |r| r.get(0))?;
                    appear_ins.execute([quote_id, source_id])?;
                }
                stats.records += 1;
            }
        }
        tx.commit()?;
    }

    Ok(stats)
}

// ── Search ──

pub struct SearchHit {
    pub quote: String,
    pub author: String,
    pub source: Option<String>,
    pub score: f64,
}

pub struct QuoteRow {
    pub quote: String,
    pub author: String,
    pub source: Option<String>,
}

/// Prefix full-text search over quote text, best matches first.
pub fn search_quotes(conn: &Connection, term: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    // FTS5 prefix phrase: "term"*  (embedded quotes doubled)
    let match_expr = format!("\"{}\"*", term.replace('"', "\"\""));

    let mut stmt = conn.prepare(
        "SELECT q.text, a.name, s.title, bm25(quote_fts) AS score
         FROM quote_fts
         JOIN quotes q ON q.id = quote_fts.rowid
         JOIN attributed_to att ON att.quote_id = q.id
         JOIN authors a ON a.id = att.author_id
         LEFT JOIN appears_in ai ON ai.quote_id = q.id
         LEFT JOIN sources s ON s.id = ai.source_id
         WHERE quote_fts MATCH ?1
         ORDER BY score, q.id
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![match_expr, limit as i64], |row| {
            Ok(SearchHit {
                quote: row.get(0)?,
                author: row.get(1)?,
                source: row.get(2)?,
                score: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Quotes whose author name contains the given text, case-insensitively.
pub fn search_by_author(conn: &Connection, name: &str, limit: usize) -> Result<Vec<QuoteRow>> {
    quote_rows(
        conn,
        "SELECT q.text, a.name, s.title
         FROM authors a
         JOIN attributed_to att ON att.author_id = a.id
         JOIN quotes q ON q.id = att.quote_id
         LEFT JOIN appears_in ai ON ai.quote_id = q.id
         LEFT JOIN sources s ON s.id = ai.source_id
         WHERE lower(a.name) LIKE '%' || lower(?1) || '%'
         ORDER BY a.name, q.text
         LIMIT ?2",
        name,
        limit,
    )
}

/// Quotes from sources whose title contains the given text.
pub fn search_by_source(conn: &Connection, title: &str, limit: usize) -> Result<Vec<QuoteRow>> {
    quote_rows(
        conn,
        "SELECT q.text, a.name, s.title
         FROM sources s
         JOIN appears_in ai ON ai.source_id = s.id
         JOIN quotes q ON q.id = ai.quote_id
         JOIN attributed_to att ON att.quote_id = q.id
         JOIN authors a ON a.id = att.author_id
         WHERE lower(s.title) LIKE '%' || lower(?1) || '%'
         ORDER BY s.title, a.name, q.text
         LIMIT ?2",
        title,
        limit,
    )
}

fn quote_rows(conn: &Connection, sql: &str, term: &str, limit: usize) -> Result<Vec<QuoteRow>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(rusqlite::params![term, limit as i64], |row| {
            Ok(QuoteRow {
                quote: row.get(0)?,
                author: row.get(1)?,
                source: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub authors: usize,
    pub quotes: usize,
    pub sources: usize,
    pub attributions: usize,
    pub appearances: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        Ok(conn.query_row(sql, [], |r| r.get(0))?)
    };
    Ok(Stats {
        authors: count("SELECT COUNT(*) FROM authors")?,
        quotes: count("SELECT COUNT(*) FROM quotes")?,
        sources: count("SELECT COUNT(*) FROM sources")?,
        attributions: count("SELECT COUNT(*) FROM attributed_to")?,
        appearances: count("SELECT COUNT(*) FROM appears_in")?,
    })
}

// ── Tests ──
