//! Kompas scraper
//!
//! Tag pages (e.g. `https://www.kompas.com/tag/investasi`) are paginated
//! with `?sort=asc&page=N`. Article pages use the `read__*` class family.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{NewsSite, PageFetcher};
use crate::dataset::NewsItem;

pub struct KompasScraper {
    fetcher: PageFetcher,
    tag_url: String,
    article_item: Selector,
    article_link: Selector,
    title: Selector,
    date: Selector,
    paragraphs: Selector,
}

impl KompasScraper {
    pub fn new(fetcher: PageFetcher, tag_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            fetcher,
            tag_url: tag_url.into(),
            article_item: parse_selector("div.articleList.-list div.articleItem")?,
            article_link: parse_selector("a.article-link")?,
            title: parse_selector("h1.read__title")?,
            date: parse_selector("div.read__time")?,
            paragraphs: parse_selector("div.read__content p")?,
        })
    }

    fn page_url(&self, page: u32) -> Result<String> {
        let mut url = Url::parse(&self.tag_url)
            .with_context(|| format!("Invalid tag URL: {}", self.tag_url))?;
        url.set_query(Some(&format!("sort=asc&page={}", page)));
        Ok(url.into())
    }

    fn parse_listing(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.article_item)
            .filter_map(|item| item.select(&self.article_link).next())
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| !href.is_empty())
            .map(|href| href.replacen("http://", "https://", 1))
            .collect()
    }

    fn parse_article(&self, html: &str, link: &str) -> NewsItem {
        let document = Html::parse_document(html);

        let tanggal = first_text_or(&document, &self.date, "N/A");
        let judul = first_text_or(&document, &self.title, "N/A");
        let paragraphs: Vec<String> = document
            .select(&self.paragraphs)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let isi = if paragraphs.is_empty() {
            "N/A".to_string()
        } else {
            paragraphs.join(" ")
        };

        NewsItem {
            tanggal,
            judul,
            link: link.to_string(),
            isi,
        }
    }
}

#[async_trait]
impl NewsSite for KompasScraper {
    fn name(&self) -> &str {
        "kompas"
    }

    async fn collect_links(&self, start_page: u32, end_page: u32) -> Result<Vec<String>> {
        let mut links = Vec::new();
        for page in start_page..=end_page {
            let url = self.page_url(page)?;

            match self.fetcher.get_html(&url).await {
                Some(html) => {
                    let found = self.parse_listing(&html);
                    tracing::info!(
                        "Processed page {} ({} to {}) with {} articles.",
                        page,
                        start_page,
                        end_page,
                        found.len()
                    );
                    links.extend(found);
                }
                None => tracing::warn!("Failed to retrieve content on page {}.", page),
            }
        }
        Ok(links)
    }

    async fn fetch_article(&self, link: &str) -> NewsItem {
        match self.fetcher.get_html(link).await {
            Some(html) => self.parse_article(&html, link),
            None => NewsItem {
                tanggal: "error".to_string(),
                judul: "error".to_string(),
                link: link.to_string(),
                isi: "error".to_string(),
            },
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {:?}: {:?}", css, e))
}

fn first_text_or(document: &Html, selector: &Selector, fallback: &str) -> String {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> KompasScraper {
        KompasScraper::new(
            PageFetcher::with_defaults().unwrap(),
            "https://www.kompas.com/tag/investasi",
        )
        .unwrap()
    }

    #[test]
    fn page_url_appends_sort_and_page() {
        let url = scraper().page_url(3).unwrap();
        assert_eq!(url, "https://www.kompas.com/tag/investasi?sort=asc&page=3");
    }

    #[test]
    fn listing_upgrades_links_to_https() {
        let html = r#"
            <div class="articleList -list">
              <div class="articleItem">
                <a class="article-link" href="http://money.kompas.com/read/1">a</a>
              </div>
              <div class="articleItem">
                <a class="article-link" href="https://money.kompas.com/read/2">b</a>
              </div>
              <div class="articleItem"><a href="https://other">no class</a></div>
            </div>
        "#;

        let links = scraper().parse_listing(html);
        assert_eq!(
            links,
            vec![
                "https://money.kompas.com/read/1",
                "https://money.kompas.com/read/2",
            ]
        );
    }

    #[test]
    fn article_fields_are_extracted() {
        let html = r#"
            <html><body>
              <h1 class="read__title">Investasi Tumbuh</h1>
              <div class="read__time">Kompas.com - 05/03/2024, 14:30 WIB</div>
              <div class="read__content">
                <p>Kalimat satu.</p>
                <p>Kalimat dua.</p>
              </div>
            </body></html>
        "#;

        let item = scraper().parse_article(html, "https://money.kompas.com/read/1");
        assert_eq!(item.judul, "Investasi Tumbuh");
        assert_eq!(item.tanggal, "Kompas.com - 05/03/2024, 14:30 WIB");
        assert_eq!(item.isi, "Kalimat satu. Kalimat dua.");
    }

    #[test]
    fn missing_fields_fall_back_to_na() {
        let item = scraper().parse_article("<html><body></body></html>", "https://x");
        assert_eq!(item.judul, "N/A");
        assert_eq!(item.tanggal, "N/A");
        assert_eq!(item.isi, "N/A");
        assert!(item.is_incomplete());
    }
}
