//! CNBC Indonesia scraper
//!
//! Listing pages are index/tag URLs paginated through a `page` query
//! parameter, e.g. `https://www.cnbcindonesia.com/market/indeks/5?tipe=artikel&page=2`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{NewsSite, PageFetcher};
use crate::dataset::NewsItem;

/// Only links back into the portal are articles; everything else on the
/// cards (ads, partner widgets) is dropped.
const LINK_PREFIX: &str = "https://www.cnbcindonesia.com/";

pub struct CnbcScraper {
    fetcher: PageFetcher,
    tag_url: String,
    card_link: Selector,
    title: Selector,
    date: Selector,
    paragraphs: Selector,
}

impl CnbcScraper {
    pub fn new(fetcher: PageFetcher, tag_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            fetcher,
            tag_url: tag_url.into(),
            card_link: parse_selector("article a.group.flex.gap-4.items-center")?,
            title: parse_selector("h1.mb-4.text-32.font-extrabold")?,
            date: parse_selector("div.text-cm.text-gray")?,
            paragraphs: parse_selector("div.detail-text p")?,
        })
    }

    /// Rewrite the `page` query parameter on the tag URL, preserving every
    /// other parameter (`kanal`, `tipe`, ...).
    fn page_url(&self, page: u32) -> Result<String> {
        let mut url = Url::parse(&self.tag_url)
            .with_context(|| format!("Invalid tag URL: {}", self.tag_url))?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(&kept)
            .append_pair("page", &page.to_string());

        Ok(url.into())
    }

    fn parse_listing(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.card_link)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with(LINK_PREFIX))
            .map(str::to_string)
            .collect()
    }

    fn parse_article(&self, html: &str, link: &str) -> NewsItem {
        let document = Html::parse_document(html);

        let judul = first_text(&document, &self.title);
        let tanggal = first_text(&document, &self.date);
        let isi = document
            .select(&self.paragraphs)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        NewsItem {
            tanggal,
            judul,
            link: link.to_string(),
            isi,
        }
    }
}

#[async_trait]
impl NewsSite for CnbcScraper {
    fn name(&self) -> &str {
        "cnbc"
    }

    async fn collect_links(&self, start_page: u32, end_page: u32) -> Result<Vec<String>> {
        let mut links = Vec::new();
        for page in start_page..=end_page {
            let url = self.page_url(page)?;
            tracing::info!("Collecting links from: {}", url);

            match self.fetcher.get_html(&url).await {
                Some(html) => {
                    let found = self.parse_listing(&html);
                    tracing::info!("Page {}: {} article links", page, found.len());
                    links.extend(found);
                }
                None => tracing::warn!("Failed to retrieve listing page {}", page),
            }
        }
        Ok(links)
    }

    async fn fetch_article(&self, link: &str) -> NewsItem {
        match self.fetcher.get_html(link).await {
            Some(html) => self.parse_article(&html, link),
            None => NewsItem {
                tanggal: String::new(),
                judul: String::new(),
                link: link.to_string(),
                isi: String::new(),
            },
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {:?}: {:?}", css, e))
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> CnbcScraper {
        CnbcScraper::new(
            PageFetcher::with_defaults().unwrap(),
            "https://www.cnbcindonesia.com/market/indeks/5?tipe=artikel&page=2",
        )
        .unwrap()
    }

    #[test]
    fn page_url_replaces_page_and_keeps_other_params() {
        let url = scraper().page_url(7).unwrap();
        assert!(url.contains("tipe=artikel"));
        assert!(url.contains("page=7"));
        assert!(!url.contains("page=2"));
    }

    #[test]
    fn listing_extracts_only_portal_links() {
        let html = r#"
            <html><body>
              <article>
                <a class="group flex gap-4 items-center"
                   href="https://www.cnbcindonesia.com/market/berita-1">x</a>
              </article>
              <article>
                <a class="group flex gap-4 items-center"
                   href="https://ads.example.com/out">ad</a>
              </article>
              <article><a href="https://www.cnbcindonesia.com/market/no-class">y</a></article>
            </body></html>
        "#;

        let links = scraper().parse_listing(html);
        assert_eq!(links, vec!["https://www.cnbcindonesia.com/market/berita-1"]);
    }

    #[test]
    fn article_fields_are_extracted() {
        let html = r#"
            <html><body>
              <h1 class="mb-4 text-32 font-extrabold">Judul Berita</h1>
              <div class="text-cm text-gray">01/02/2024, 10:00 WIB</div>
              <div class="detail-text">
                <p>Paragraf satu.</p>
                <p>Paragraf dua.</p>
              </div>
            </body></html>
        "#;

        let item = scraper().parse_article(html, "https://www.cnbcindonesia.com/a");
        assert_eq!(item.judul, "Judul Berita");
        assert_eq!(item.tanggal, "01/02/2024, 10:00 WIB");
        assert_eq!(item.isi, "Paragraf satu.\nParagraf dua.");
    }

    #[test]
    fn missing_fields_come_back_empty() {
        let item = scraper().parse_article("<html><body></body></html>", "https://x");
        assert!(item.judul.is_empty());
        assert!(item.tanggal.is_empty());
        assert!(item.isi.is_empty());
        assert!(item.is_incomplete());
    }
}
