//! Article dataset - semicolon-delimited CSV persistence
//!
//! Scraped articles are stored as `tanggal;judul;link;isi` rows. The link
//! is the natural key: re-scraping an article updates its row in place,
//! new articles are appended. Reading a missing file yields an empty
//! dataset so a first scrape and a follow-up scrape share one code path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// One scraped news article row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Publication date, as printed on the page (e.g. "01/02/2024, 10:00 WIB")
    pub tanggal: String,
    /// Article title
    pub judul: String,
    /// Canonical article URL (natural key)
    pub link: String,
    /// Article body text
    pub isi: String,
}

impl NewsItem {
    /// A row is incomplete when any field is empty or carries one of the
    /// placeholder markers the scrapers write on fetch failure.
    pub fn is_incomplete(&self) -> bool {
        [&self.tanggal, &self.judul, &self.isi]
            .iter()
            .any(|f| f.is_empty() || f.as_str() == "N/A" || f.as_str() == "error")
    }
}

// ============================================================================
// NewsCsv
// ============================================================================

/// Semicolon-delimited CSV store for scraped articles.
pub struct NewsCsv {
    path: PathBuf,
}

impl NewsCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all rows. A missing file is an empty dataset.
    pub fn read(&self) -> Result<Vec<NewsItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open dataset CSV: {:?}", self.path))?;

        let mut items = Vec::new();
        for row in reader.deserialize() {
            match row {
                Ok(item) => items.push(item),
                Err(e) => {
                    // Mirrors pandas' on_bad_lines="skip": keep going.
                    tracing::warn!("Skipping bad CSV row in {:?}: {}", self.path, e);
                }
            }
        }
        Ok(items)
    }

    /// Overwrite the file with the given rows.
    pub fn write(&self, items: &[NewsItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&self.path)
            .with_context(|| format!("Failed to create dataset CSV: {:?}", self.path))?;

        for item in items {
            writer.serialize(item).context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush CSV")?;
        Ok(())
    }

    /// Merge `incoming` into the stored rows, keyed by link: existing rows
    /// are updated in place (original order preserved), unknown links are
    /// appended in input order.
    pub fn upsert(&self, incoming: &[NewsItem]) -> Result<usize> {
        let mut items = self.read()?;
        let mut by_link: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.link.clone(), i))
            .collect();

        for news in incoming {
            match by_link.get(&news.link) {
                Some(&i) => items[i] = news.clone(),
                None => {
                    by_link.insert(news.link.clone(), items.len());
                    items.push(news.clone());
                }
            }
        }

        self.write(&items)?;
        Ok(items.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
