use super::resolve::{normalize_text, Attempt, UrlNormalizer};
use crate::config::SelectorConfig;
use crate::error::{Result, ScraperError};
pub use crate::{log_debug, log_info};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// One ranked listing entry. Absent fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub rank: usize,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub rating: Option<String>,
    pub cover: Option<String>,
    pub href: Option<String>,
}

impl CardRecord {
    pub fn is_identified(&self) -> bool {
        self.title.is_some() || self.cover.is_some()
    }
}

/// Drops records that have neither a title nor a cover.
pub fn retain_identified(records: Vec<CardRecord>) -> Vec<CardRecord> {
    let before = records.len();
    let kept: Vec<CardRecord> = records
        .into_iter()
        .filter(CardRecord::is_identified)
        .collect();
    if kept.len() < before {
        log_debug!(
            "[extract] Dropped {} card(s) with neither title nor cover",
            before - kept.len()
        );
    }
    kept
}

pub struct CardExtractor {
    card: Selector,
    title: Selector,
    subtitle: Selector,
    rating: Selector,
    cover: Vec<Attempt>,
    link: Vec<Attempt>,
    urls: UrlNormalizer,
}

impl CardExtractor {
    pub fn new(selectors: &SelectorConfig, origin: &str) -> Result<Self> {
        Ok(Self {
            card: parse_selector(&selectors.card)?,
            title: parse_selector(&selectors.title)?,
            subtitle: parse_selector(&selectors.subtitle)?,
            rating: parse_selector(&selectors.rating)?,
            cover: vec![
                Attempt::srcset(parse_selector(&selectors.cover_avif)?),
                Attempt::srcset(parse_selector(&selectors.cover_webp)?),
                Attempt::attr(parse_selector(&selectors.cover_img)?, "src"),
                Attempt::attr(parse_selector(&selectors.cover_img_fallback)?, "src"),
            ],
            link: vec![
                Attempt::attr(parse_selector(&selectors.link)?, "href"),
                Attempt::attr(parse_selector(&selectors.link_fallback)?, "href"),
            ],
            urls: UrlNormalizer::new(origin),
        })
    }

    /// One record per card, ranked from 1 in document order.
    pub fn extract(&self, document: &Html) -> Vec<CardRecord> {
        let records: Vec<CardRecord> = document
            .select(&self.card)
            .enumerate()
            .map(|(index, card)| self.extract_card(index + 1, &card))
            .collect();

        log_info!("[extract] Extracted {} card(s)", records.len());
        records
    }

    fn extract_card(&self, rank: usize, card: &ElementRef) -> CardRecord {
        CardRecord {
            rank,
            title: self.extract_text(card, &self.title),
            subtitle: self.extract_text(card, &self.subtitle),
            rating: self.extract_text(card, &self.rating),
            cover: Attempt::first_resolved(&self.cover, card).map(|url| self.urls.cover(url)),
            href: Attempt::first_resolved(&self.link, card).map(|url| self.urls.href(url)),
        }
    }

    fn extract_text(&self, card: &ElementRef, selector: &Selector) -> Option<String> {
        let node = card.select(selector).next()?;
        normalize_text(&node.text().collect::<String>())
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::SelectorError(format!("`{}`: {}", css, e)).into())
}
