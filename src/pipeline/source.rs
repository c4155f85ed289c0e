//! Article source - ordered, position-indexed article supply
//!
//! The batch runner consumes articles strictly in increasing position
//! order, starting from the checkpoint's resume offset. Positions are
//! global row numbers in the full dataset, so checkpoints stay valid
//! across runs over the same CSV.

use anyhow::Result;

use crate::dataset::NewsCsv;

/// One article as the pipeline sees it.
#[derive(Debug, Clone)]
pub struct Article {
    /// Global row number in the dataset
    pub position: usize,
    /// Article body text
    pub text: String,
    /// Publication date, passed through opaque
    pub date: String,
}

/// Ordered article supply. Read-only to the batch runner.
pub trait ArticleSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Articles in `[start, end)`, in position order. Bounds beyond the
    /// dataset are clamped.
    fn slice(&self, start: usize, end: usize) -> Vec<Article>;
}

/// In-memory source backed by the scraped article CSV (`isi` is the text,
/// `tanggal` the date).
pub struct CsvArticleSource {
    articles: Vec<Article>,
}

impl CsvArticleSource {
    pub fn load(store: &NewsCsv) -> Result<Self> {
        let articles = store
            .read()?
            .into_iter()
            .enumerate()
            .map(|(position, item)| Article {
                position,
                text: item.isi,
                date: item.tanggal,
            })
            .collect();
        Ok(Self { articles })
    }
}

impl ArticleSource for CsvArticleSource {
    fn len(&self) -> usize {
        self.articles.len()
    }

    fn slice(&self, start: usize, end: usize) -> Vec<Article> {
        let end = end.min(self.articles.len());
        let start = start.min(end);
        self.articles[start..end].to_vec()
    }
}

// ============================================================================
// Tests
// ============================================================================
