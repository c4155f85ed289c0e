//! CLI module
//!
//! indovest-kg command definitions and implementations: scraping, dataset
//! cleanup, the extraction pipeline, and status reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::dataset::NewsCsv;
use crate::extraction::{get_api_key, has_api_key, OpenAiExtractor};
use crate::pipeline::{
    sink, BatchRunner, CheckpointStore, CsvArticleSource, JsonlSink, RunConfig,
};
use crate::scrape::cleaning::Cleaner;
use crate::scrape::cnbc::CnbcScraper;
use crate::scrape::kompas::KompasScraper;
use crate::scrape::{fetch_articles, FetchConfig, NewsSite, PageFetcher};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "indovest-kg")]
#[command(version, about = "Knowledge-graph dataset builder for Indonesian investment news", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Site {
    Cnbc,
    Kompas,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl listing pages and merge articles into the dataset CSV
    Scrape {
        /// News portal to crawl
        #[arg(value_enum)]
        site: Site,

        /// Tag/listing URL to paginate
        #[arg(short, long)]
        tag_url: String,

        /// First listing page
        #[arg(long, default_value = "1")]
        start_page: u32,

        /// Last listing page (inclusive)
        #[arg(long, default_value = "1")]
        end_page: u32,

        /// Dataset CSV to create or update
        #[arg(short, long)]
        output: PathBuf,

        /// Concurrent article fetches
        #[arg(short, long, default_value = "8")]
        workers: usize,
    },

    /// Re-fetch rows with missing or error-marked fields
    Rescrape {
        #[arg(value_enum)]
        site: Site,

        /// Dataset CSV to repair in place
        #[arg(short, long)]
        input: PathBuf,

        /// Concurrent article fetches
        #[arg(short, long, default_value = "16")]
        workers: usize,
    },

    /// Normalize dates and clean article bodies in place
    Clean {
        /// Dataset CSV to clean
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run the checkpointed entity-extraction pipeline
    Extract {
        /// Scraped dataset CSV (tanggal;judul;link;isi)
        #[arg(short, long)]
        input: PathBuf,

        /// JSONL output stream (opened in append mode)
        #[arg(short, long)]
        output: PathBuf,

        /// Checkpoint file (default: extraction_checkpoint.json next to the output)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Articles per batch call
        #[arg(long, default_value = "20")]
        batch_size: usize,

        /// First dataset row to process
        #[arg(long, default_value = "0")]
        start_row: usize,

        /// Row bound (exclusive); defaults to the whole dataset
        #[arg(long)]
        end_row: Option<usize>,

        /// Attempts per article in the single-item fallback
        #[arg(long, default_value = "5")]
        max_retries: u32,

        /// Seconds between fallback attempts
        #[arg(long, default_value = "10")]
        retry_delay: u64,

        /// Per-article timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,

        /// Model to extract with
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
    },

    /// Show dataset, checkpoint, and output status
    Status {
        /// Dataset CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSONL output stream
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Checkpoint file
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scrape {
            site,
            tag_url,
            start_page,
            end_page,
            output,
            workers,
        } => cmd_scrape(site, &tag_url, start_page, end_page, output, workers).await,
        Commands::Rescrape {
            site,
            input,
            workers,
        } => cmd_rescrape(site, input, workers).await,
        Commands::Clean { input } => cmd_clean(input),
        Commands::Extract {
            input,
            output,
            checkpoint,
            batch_size,
            start_row,
            end_row,
            max_retries,
            retry_delay,
            timeout,
            model,
        } => {
            cmd_extract(
                input,
                output,
                checkpoint,
                RunConfig {
                    batch_size,
                    max_article_retries: max_retries,
                    retry_delay: Duration::from_secs(retry_delay),
                    timeout_per_article: Duration::from_secs(timeout),
                    start_row,
                    end_row,
                    ..RunConfig::default()
                },
                model,
            )
            .await
        }
        Commands::Status {
            input,
            output,
            checkpoint,
        } => cmd_status(input, output, checkpoint),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn build_site(site: Site, tag_url: &str) -> Result<Box<dyn NewsSite>> {
    let fetcher = PageFetcher::new(FetchConfig::default())?;
    Ok(match site {
        Site::Cnbc => Box::new(CnbcScraper::new(fetcher, tag_url)?),
        Site::Kompas => Box::new(KompasScraper::new(fetcher, tag_url)?),
    })
}

/// Crawl listing pages, fetch every article, and merge into the CSV.
async fn cmd_scrape(
    site: Site,
    tag_url: &str,
    start_page: u32,
    end_page: u32,
    output: PathBuf,
    workers: usize,
) -> Result<()> {
    if start_page > end_page {
        bail!("start_page ({}) is after end_page ({})", start_page, end_page);
    }

    let started = Instant::now();
    let scraper = build_site(site, tag_url)?;

    let links = scraper.collect_links(start_page, end_page).await?;
    tracing::info!("Total links collected: {}", links.len());
    if links.is_empty() {
        bail!("No links collected. Exiting.");
    }

    let news = fetch_articles(scraper.as_ref(), &links, workers).await;

    let store = NewsCsv::new(&output);
    let total = store.upsert(&news).context("Failed to update dataset CSV")?;

    println!(
        "[OK] {} articles scraped, dataset now {} rows",
        news.len(),
        total
    );
    println!("     File: {}", store.path().display());
    tracing::info!(
        "Execution time: {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Re-fetch only the incomplete rows of an existing dataset.
async fn cmd_rescrape(site: Site, input: PathBuf, workers: usize) -> Result<()> {
    let store = NewsCsv::new(&input);
    let items = store.read()?;
    if items.is_empty() {
        bail!("Dataset is empty or missing: {}", input.display());
    }

    let links: Vec<String> = items
        .iter()
        .filter(|item| item.is_incomplete())
        .map(|item| item.link.clone())
        .collect();

    if links.is_empty() {
        println!("[OK] No incomplete rows, nothing to re-scrape.");
        return Ok(());
    }
    println!("[*] Re-scraping {} incomplete rows...", links.len());

    // The listing URL is irrelevant here; only article pages are fetched.
    let base = match site {
        Site::Cnbc => "https://www.cnbcindonesia.com",
        Site::Kompas => "https://www.kompas.com",
    };
    let scraper = build_site(site, base)?;

    let news = fetch_articles(scraper.as_ref(), &links, workers).await;
    store.upsert(&news).context("Failed to update dataset CSV")?;

    let still_bad = news.iter().filter(|item| item.is_incomplete()).count();
    println!(
        "[OK] Re-scraped {} rows ({} still incomplete)",
        news.len(),
        still_bad
    );
    Ok(())
}

/// Clean the dataset in place: normalize dates, drop title echoes and
/// pasted duplicates from the bodies.
fn cmd_clean(input: PathBuf) -> Result<()> {
    let store = NewsCsv::new(&input);
    let mut items = store.read()?;
    if items.is_empty() {
        bail!("Dataset is empty or missing: {}", input.display());
    }

    let cleaner = Cleaner::new()?;
    for item in &mut items {
        cleaner.clean_item(item);
    }
    store.write(&items)?;

    println!("[OK] Cleaned {} rows in {}", items.len(), input.display());
    Ok(())
}

/// Run the extraction pipeline over the dataset.
async fn cmd_extract(
    input: PathBuf,
    output: PathBuf,
    checkpoint: Option<PathBuf>,
    config: RunConfig,
    model: String,
) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API key not set.\n\n\
             Configure it with:\n  \
             export OPENAI_API_KEY=your-api-key"
        );
    }

    let source = CsvArticleSource::load(&NewsCsv::new(&input))
        .with_context(|| format!("Failed to load dataset: {}", input.display()))?;

    let checkpoint_path = checkpoint.unwrap_or_else(|| default_checkpoint_path(&output));
    let checkpoint = CheckpointStore::new(checkpoint_path);
    let mut sink = JsonlSink::open(&output)?;

    let extractor = OpenAiExtractor::with_model(get_api_key()?, model)?;
    println!(
        "[*] Extracting with {} (batch size {}, {} retries per article)",
        extractor.model(),
        config.batch_size,
        config.max_article_retries
    );

    let runner = BatchRunner::new(extractor, config);
    let report = runner.run(&source, &mut sink, &checkpoint).await?;

    println!(
        "[OK] {} articles processed: {} with entities ({} lines), {} empty, {} failed",
        report.processed,
        report.with_entities,
        report.entity_lines,
        report.empty,
        report.failed
    );
    println!("     Output: {}", output.display());
    Ok(())
}

fn cmd_status(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
) -> Result<()> {
    println!("indovest-kg v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] API key: set");
    } else {
        println!("[!] API key: not set");
        println!("    Configure: export OPENAI_API_KEY=your-key");
    }

    if let Some(input) = input {
        match NewsCsv::new(&input).read() {
            Ok(items) => {
                let incomplete = items.iter().filter(|i| i.is_incomplete()).count();
                println!(
                    "[OK] Dataset: {} rows ({} incomplete) in {}",
                    items.len(),
                    incomplete,
                    input.display()
                );
            }
            Err(e) => println!("[!] Dataset unreadable: {}", e),
        }
    }

    if let Some(output) = &output {
        match sink::count_lines(output) {
            Ok(n) => println!("[OK] Output stream: {} records in {}", n, output.display()),
            Err(e) => println!("[!] Output stream unreadable: {}", e),
        }
    }

    let checkpoint_path = checkpoint.or_else(|| output.as_deref().map(default_checkpoint_path));
    if let Some(path) = checkpoint_path {
        let store = CheckpointStore::new(&path);
        if store.exists() {
            println!(
                "[*] Checkpoint present: next run resumes from row {}",
                store.load(0)
            );
        } else {
            println!("[*] No checkpoint: next run starts fresh");
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Default checkpoint location: `extraction_checkpoint.json` next to the
/// output stream.
fn default_checkpoint_path(output: &std::path::Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join("extraction_checkpoint.json")
        }
        _ => PathBuf::from("extraction_checkpoint.json"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_defaults_next_to_output() {
        let path = default_checkpoint_path(std::path::Path::new("data/graph/out.jsonl"));
        assert_eq!(path, PathBuf::from("data/graph/extraction_checkpoint.json"));
    }

    #[test]
    fn checkpoint_default_for_bare_filename() {
        let path = default_checkpoint_path(std::path::Path::new("out.jsonl"));
        assert_eq!(path, PathBuf::from("extraction_checkpoint.json"));
    }

    #[test]
    fn cli_parses_extract_command() {
        let cli = Cli::try_parse_from([
            "indovest-kg",
            "extract",
            "--input",
            "news.csv",
            "--output",
            "graph.jsonl",
            "--batch-size",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract {
                batch_size,
                max_retries,
                ..
            } => {
                assert_eq!(batch_size, 10);
                assert_eq!(max_retries, 5);
            }
            _ => panic!("expected extract command"),
        }
    }

    #[test]
    fn cli_parses_scrape_site() {
        let cli = Cli::try_parse_from([
            "indovest-kg",
            "scrape",
            "kompas",
            "--tag-url",
            "https://www.kompas.com/tag/investasi",
            "--output",
            "news.csv",
        ])
        .unwrap();

        match cli.command {
            Commands::Scrape {
                site,
                start_page,
                end_page,
                ..
            } => {
                assert_eq!(site, Site::Kompas);
                assert_eq!((start_page, end_page), (1, 1));
            }
            _ => panic!("expected scrape command"),
        }
    }
}
