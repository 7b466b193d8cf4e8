mod card;
mod resolve;

pub use card::{retain_identified, CardExtractor, CardRecord};

use scraper::Html;

/// A parsed snapshot of the listing page.
pub struct Scraper {
    document: Html,
}

impl Scraper {
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    pub fn cards(&self, extractor: &CardExtractor) -> Vec<CardRecord> {
        extractor.extract(&self.document)
    }
}
