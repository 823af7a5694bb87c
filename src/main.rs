mod config;
mod db;
mod dump;
mod normalize;
mod parser;
mod records;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use config::Config;
use dump::{DumpReader, Page};
use normalize::DedupSet;
use records::{QuoteRecord, RecordWriter};

#[derive(Parser)]
#[command(name = "quotegraph", about = "Wikiquote dump to quote graph pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract deduplicated quote records from a wiki XML export
    Extract {
        /// Dump file path (default: $DUMP_FILE)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Records output path (default: $QUOTES_FILE)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Max content pages to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Load extracted records into the quote graph
    Load {
        /// Records file path (default: $QUOTES_FILE)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Records per transaction (default: $BATCH_SIZE)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
    /// Extract + load in one pipeline
    Run {
        /// Dump file path (default: $DUMP_FILE)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Max content pages to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Prefix search over loaded quote text
    Search {
        term: String,
        /// Match author names instead of quote text
        #[arg(long)]
        author: bool,
        /// Match source titles instead of quote text
        #[arg(long)]
        source: bool,
        /// Max results (default: $SEARCH_LIMIT)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Quote graph statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = Config::from_env();

    let result = match cli.command {
        Commands::Extract { input, output, limit } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&cfg.dump_file));
            let output = output.unwrap_or_else(|| PathBuf::from(&cfg.records_file));
            let counts = extract_pages(&input, &output, limit)?;
            counts.print();
            Ok(())
        }
        Commands::Load { input, batch_size } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&cfg.records_file));
            let batch_size = batch_size.unwrap_or(cfg.batch_size);
            load_into_graph(&cfg, &input, batch_size)
        }
        Commands::Run { input, limit } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&cfg.dump_file));
            let output = PathBuf::from(&cfg.records_file);
            let counts = extract_pages(&input, &output, limit)?;
            counts.print();
            if counts.quotes == 0 {
                println!("No quotes extracted; nothing to load.");
                return Ok(());
            }
            load_into_graph(&cfg, &output, cfg.batch_size)
        }
        Commands::Search { term, author, source, limit } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let limit = limit.unwrap_or(cfg.search_limit);
            if author {
                print_rows(&db::search_by_author(&conn, &term, limit)?, &term);
            } else if source {
                print_rows(&db::search_by_source(&conn, &term, limit)?, &term);
            } else {
                let hits = db::search_quotes(&conn, &term, limit)?;
                if hits.is_empty() {
                    println!("No quotes found for '{}'", term);
                } else {
                    println!("Found {} quotes:\n", hits.len());
                    for (i, hit) in hits.iter().enumerate() {
                        println!("{}. \"{}\"", i + 1, hit.quote);
                        match &hit.source {
                            Some(source) => println!("   - {} (from {})", hit.author, source),
                            None => println!("   - {}", hit.author),
                        }
                        println!("   - relevance: {:.3}", -hit.score);
                    }
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Authors:      {}", s.authors);
            println!("Quotes:       {}", s.quotes);
            println!("Sources:      {}", s.sources);
            println!("Attributions: {}", s.attributions);
            println!("Appearances:  {}", s.appearances);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ExtractCounts {
    pages: usize,
    malformed: usize,
    quotes: usize,
    duplicates: usize,
}

impl ExtractCounts {
    fn print(&self) {
        println!(
            "Processed {} pages: {} quotes emitted, {} duplicates dropped, {} malformed entries skipped.",
            self.pages, self.quotes, self.duplicates, self.malformed,
        );
    }
}

const PAGE_CHUNK: usize = 512;

/// Stream the dump, extract each chunk of pages in parallel, and fold the
/// results through the run's dedup set into the record stream. The dedup set
/// is the only state shared across pages, so it stays on this thread.
fn extract_pages(input: &Path, output: &Path, limit: Option<usize>) -> Result<ExtractCounts> {
    let reader = DumpReader::open(input)
        .with_context(|| format!("opening dump {}", input.display()))?;
    let mut writer = RecordWriter::create(output)?;
    let mut dedup = DedupSet::new();
    let mut counts = ExtractCounts { pages: 0, malformed: 0, quotes: 0, duplicates: 0 };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {pos} pages ({per_sec})")?);

    let mut batch: Vec<Page> = Vec::with_capacity(PAGE_CHUNK);
    for entry in reader {
        match entry {
            Ok(page) => {
                batch.push(page);
                counts.pages += 1;
                pb.inc(1);
                if batch.len() >= PAGE_CHUNK {
                    drain_batch(&mut batch, &mut dedup, &mut writer, &mut counts)?;
                }
                if limit.is_some_and(|n| counts.pages >= n) {
                    break;
                }
            }
            Err(e) => {
                warn!("skipping dump entry: {e}");
                counts.malformed += 1;
            }
        }
    }
    drain_batch(&mut batch, &mut dedup, &mut writer, &mut counts)?;
    writer.flush()?;
    pb.finish_and_clear();

    info!("extracted {} quotes from {} pages", counts.quotes, counts.pages);
    Ok(counts)
}

fn drain_batch(
    batch: &mut Vec<Page>,
    dedup: &mut DedupSet,
    writer: &mut RecordWriter<std::fs::File>,
    counts: &mut ExtractCounts,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let results: Vec<_> = batch.par_iter().map(parser::process_page).collect();

    for (page, quotes) in batch.iter().zip(&results) {
        if !quotes.is_empty() {
            debug!(title = %page.title, count = quotes.len(), "extracted quotes");
        }
    }

    for quote in results.into_iter().flatten() {
        if dedup.insert(&quote) {
            writer.write(&QuoteRecord {
                author: quote.author,
                quote: quote.text,
                source: quote.source,
            })?;
            counts.quotes += 1;
        } else {
            counts.duplicates += 1;
        }
    }

    writer.flush()?;
    batch.clear();
    Ok(())
}

fn load_into_graph(cfg: &Config, input: &Path, batch_size: usize) -> Result<()> {
    let records = records::read_records(input)?;
    if records.is_empty() {
        println!("No records in {}. Run 'extract' first.", input.display());
        return Ok(());
    }

    let conn = db::connect(&cfg.db_path)?;
    db::init_schema(&conn)?;

    println!("Loading {} records...", records.len());
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut total = db::LoadStats { records: 0, new_quotes: 0 };
    for chunk in records.chunks(batch_size.max(1)) {
        let stats = db::load_records(&conn, chunk, chunk.len())?;
        total.records += stats.records;
        total.new_quotes += stats.new_quotes;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    let s = db::get_stats(&conn)?;
    println!(
        "Loaded {} records ({} new quotes). Graph now has {} authors, {} quotes, {} sources.",
        total.records, total.new_quotes, s.authors, s.quotes, s.sources,
    );
    Ok(())
}

fn print_rows(rows: &[db::QuoteRow], term: &str) {
    if rows.is_empty() {
        println!("No quotes found for '{}'", term);
        return;
    }
    println!("Found {} quotes:\n", rows.len());
    for (i, row) in rows.iter().enumerate() {
        println!("{}. \"{}\"", i + 1, row.quote);
        match &row.source {
            Some(source) => println!("   - {} (from {})", row.author, source),
            None => println!("   - {}", row.author),
        }
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
