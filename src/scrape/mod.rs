//! News scraping module
//!
//! Crawls tag/listing pages on Indonesian news portals, collects article
//! links, and fetches article bodies. Site-specific selectors live in
//! [`cnbc`] and [`kompas`]; this module owns the shared HTTP plumbing
//! (retries, user-agent rotation, politeness delays, HTML cache) and the
//! concurrent article fan-out.

pub mod cleaning;
pub mod cnbc;
pub mod kompas;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::Rng;
use tokio::sync::Mutex;

use crate::dataset::NewsItem;

// ============================================================================
// Fetcher
// ============================================================================

/// Rotated per request to reduce the chance of being blocked.
const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.121 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.96 Safari/537.36",
];

/// Fetcher tuning knobs.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts per URL before giving up
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Random pre-request delay range in seconds (politeness)
    pub delay_range: (f64, f64),
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(10),
            delay_range: (1.0, 3.0),
        }
    }
}

/// HTTP page fetcher with retries and an in-memory HTML cache.
///
/// Failed URLs are cached as `None` so a crawl never hammers a dead link
/// twice. The cache lives for one crawl; there is no persistence.
pub struct PageFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(FetchConfig::default())
    }

    /// Fetch a page, returning the raw HTML or `None` after all retries
    /// fail. The outcome (including failure) is cached per URL.
    pub async fn get_html(&self, url: &str) -> Option<String> {
        if let Some(cached) = self.cache.lock().await.get(url) {
            return cached.clone();
        }

        self.polite_delay().await;

        for attempt in 0..self.config.max_retries {
            let user_agent = {
                let mut rng = rand::thread_rng();
                USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
            };

            let response = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, user_agent)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => {
                        self.cache
                            .lock()
                            .await
                            .insert(url.to_string(), Some(text.clone()));
                        return Some(text);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Error reading body of {}: {}. Attempt {}/{}",
                            url,
                            e,
                            attempt + 1,
                            self.config.max_retries
                        );
                    }
                },
                Ok(resp) => {
                    tracing::warn!(
                        "Status code {} for {}. Attempt {}/{}",
                        resp.status(),
                        url,
                        attempt + 1,
                        self.config.max_retries
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Error on {}: {}. Attempt {}/{}",
                        url,
                        e,
                        attempt + 1,
                        self.config.max_retries
                    );
                }
            }

            // Linear backoff between attempts.
            tokio::time::sleep(Duration::from_secs(2 * (attempt as u64 + 1))).await;
        }

        self.cache.lock().await.insert(url.to_string(), None);
        None
    }

    async fn polite_delay(&self) {
        let (lo, hi) = self.config.delay_range;
        if hi <= 0.0 {
            return;
        }
        let secs = {
            let mut rng = rand::thread_rng();
            rng.gen_range(lo..=hi)
        };
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

// ============================================================================
// Site Contract
// ============================================================================

/// A news portal the crawler knows how to read.
#[async_trait]
pub trait NewsSite: Sync {
    fn name(&self) -> &str;

    /// Collect article links from the listing pages in `[start_page, end_page]`.
    async fn collect_links(&self, start_page: u32, end_page: u32) -> Result<Vec<String>>;

    /// Fetch one article. A failed fetch yields a placeholder row (the
    /// crawl continues; incomplete rows can be re-scraped later).
    async fn fetch_article(&self, link: &str) -> NewsItem;
}

/// Fetch all article bodies with bounded concurrency, preserving input
/// order. Workers share only the fetcher cache; each owns its own
/// request/response.
pub async fn fetch_articles(site: &dyn NewsSite, links: &[String], workers: usize) -> Vec<NewsItem> {
    let total = links.len();
    stream::iter(links.iter().enumerate().map(|(i, link)| async move {
        tracing::info!("Processing article {} of {}: {}", i + 1, total, link);
        site.fetch_article(link).await
    }))
    .buffered(workers.max(1))
    .collect()
    .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_crawler_settings() {
        let config = FetchConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cached_failure_is_returned_without_refetch() {
        let fetcher = PageFetcher::with_defaults().unwrap();
        fetcher
            .cache
            .lock()
            .await
            .insert("https://dead".to_string(), None);

        assert!(fetcher.get_html("https://dead").await.is_none());
    }

    #[tokio::test]
    async fn cached_page_is_served_from_memory() {
        let fetcher = PageFetcher::with_defaults().unwrap();
        fetcher
            .cache
            .lock()
            .await
            .insert("https://ok".to_string(), Some("<html></html>".to_string()));

        assert_eq!(
            fetcher.get_html("https://ok").await.as_deref(),
            Some("<html></html>")
        );
    }
}
