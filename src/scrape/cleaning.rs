//! Scraped-text cleanup
//!
//! Listing pages and article bodies come back with three recurring
//! defects: free-form WIB timestamps, the title echoed at the top of the
//! body, and whole passages pasted twice by the CMS. Each gets a small
//! normalization pass before the dataset is handed to extraction.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

use crate::dataset::NewsItem;

/// Normalized timestamp format written back into the dataset.
const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text cleaner with pre-compiled patterns.
pub struct Cleaner {
    date_re: Regex,
    ws_re: Regex,
}

impl Cleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            date_re: Regex::new(r"\d{2}/\d{2}/\d{4}, \d{2}:\d{2} WIB")
                .context("Failed to compile date pattern")?,
            ws_re: Regex::new(r"\s+").context("Failed to compile whitespace pattern")?,
        })
    }

    /// Pull a `dd/mm/yyyy, HH:MM WIB` timestamp out of a free-form date
    /// string. Kompas prefixes these with "Kompas.com - "; anything that
    /// does not contain the pattern parses as `None`.
    pub fn parse_wib_date(&self, raw: &str) -> Option<NaiveDateTime> {
        let matched = self.date_re.find(raw)?.as_str();
        let stripped = matched.strip_suffix(" WIB")?;
        NaiveDateTime::parse_from_str(stripped, "%d/%m/%Y, %H:%M").ok()
    }

    /// Remove the title echoed inside the body. Both sides are
    /// whitespace-normalized and lowercased first, so the comparison is
    /// effectively case-insensitive; the cleaned body stays lowercased.
    pub fn strip_title_echo(&self, judul: &str, isi: &str) -> String {
        let judul_norm = self.normalize(judul).to_lowercase();
        let isi_norm = self.normalize(isi).to_lowercase();

        if judul_norm.is_empty() {
            return isi_norm;
        }

        let cleaned = isi_norm.replace(&judul_norm, "");
        self.normalize(&cleaned)
    }

    /// Apply all cleanup passes to one dataset row: the date is rewritten
    /// in `%Y-%m-%d %H:%M:%S` form (or emptied when unparseable), the body
    /// loses its title echo and any pasted duplicates.
    pub fn clean_item(&self, item: &mut NewsItem) {
        item.tanggal = match self.parse_wib_date(&item.tanggal) {
            Some(dt) => dt.format(DATE_OUTPUT_FORMAT).to_string(),
            None => String::new(),
        };
        item.isi = dedup_repeated_prefix(&self.strip_title_echo(&item.judul, &item.isi));
    }

    fn normalize(&self, text: &str) -> String {
        self.ws_re.replace_all(text.trim(), " ").trim().to_string()
    }
}

/// Collapse accidental whole-article duplication.
///
/// Some CMS pages paste the article body twice (or more) into one page.
/// The first 100 characters act as a fingerprint: every later occurrence
/// of that fingerprint starts a duplicated copy, which is cut up to the
/// next occurrence (or the end of the text).
pub fn dedup_repeated_prefix(text: &str) -> String {
    // Need strictly more than the fingerprint length to have anything to cut.
    let prefix_end = match text.char_indices().nth(100) {
        Some((i, _)) => i,
        None => return text.to_string(),
    };
    let prefix = text[..prefix_end].to_string();

    let mut cleaned = text.to_string();
    loop {
        let search_from = prefix.len();
        let start = match cleaned[search_from..].find(&prefix) {
            Some(i) => i + search_from,
            None => break,
        };
        // Skip past the matched fingerprint; `start + prefix.len()` is a
        // char boundary, a fixed byte step into the text need not be.
        let next_from = start + prefix.len();
        let end = cleaned[next_from..]
            .find(&prefix)
            .map(|i| i + next_from)
            .unwrap_or(cleaned.len());
        cleaned = format!("{}{}", &cleaned[..start], &cleaned[end..]);
    }
    cleaned
}

// ============================================================================
// Tests
// ============================================================================
