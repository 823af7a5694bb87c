use std::env;

/// Runtime configuration sourced from the environment, with defaults that
/// work for a local checkout. CLI flags take precedence where offered.
pub struct Config {
    /// Wiki XML export to read (DUMP_FILE).
    pub dump_file: String,
    /// Extracted record stream, JSON Lines (QUOTES_FILE).
    pub records_file: String,
    /// SQLite quote graph location (QUOTEGRAPH_DB).
    pub db_path: String,
    /// Records per load transaction (BATCH_SIZE).
    pub batch_size: usize,
    /// Default search result cap (SEARCH_LIMIT).
    pub search_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            dump_file: env_or("DUMP_FILE", "enwikiquote-pages-articles.xml"),
            records_file: env_or("QUOTES_FILE", "extracted_quotes.jsonl"),
            db_path: env_or("QUOTEGRAPH_DB", "data/quotes.sqlite"),
            batch_size: env_or("BATCH_SIZE", "1000").parse().unwrap_or(1000),
            search_limit: env_or("SEARCH_LIMIT", "5").parse().unwrap_or(5),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
