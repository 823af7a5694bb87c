//! The intermediate record format: JSON Lines, UTF-8, one object per triple
//! with exactly the fields `author`, `quote`, and `source`. A quote without a
//! source carries an explicit null. The downstream loader depends on these
//! names structurally.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub author: String,
    pub quote: String,
    pub source: Option<String>,
}

pub struct RecordWriter<W: Write> {
    out: BufWriter<W>,
}

impl RecordWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        Ok(RecordWriter::new(file))
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { out: BufWriter::new(inner) }
    }

    pub fn write(&mut self, record: &QuoteRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Push buffered records to disk so an interrupted run keeps everything
    /// written so far.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        self.out
            .into_inner()
            .map_err(|e| anyhow::anyhow!("finishing record stream: {e}"))
    }
}

/// Read a records file back, failing on the first unparseable line.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<QuoteRecord>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: QuoteRecord =
            serde_json::from_str(&line).with_context(|| format!("record on line {}", i + 1))?;
        records.push(record);
    }
    Ok(records)
}

// ── Tests ──
