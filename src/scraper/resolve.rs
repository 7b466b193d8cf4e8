use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapses whitespace runs to one space and trims. Blank text is absent.
pub fn normalize_text(raw: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First URL of a source-set attribute, without its density descriptor.
pub fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset.split(',').next()?.split_whitespace().next()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Plain,
    SrcSet,
}

/// One step of an ordered fallback chain: the first element matching
/// `selector` inside a card, read through `attribute`.
#[derive(Debug, Clone)]
pub struct Attempt {
    selector: Selector,
    attribute: &'static str,
    kind: AttrKind,
}

impl Attempt {
    pub fn attr(selector: Selector, attribute: &'static str) -> Self {
        Self {
            selector,
            attribute,
            kind: AttrKind::Plain,
        }
    }

    pub fn srcset(selector: Selector) -> Self {
        Self {
            selector,
            attribute: "srcset",
            kind: AttrKind::SrcSet,
        }
    }

    pub fn resolve(&self, card: &ElementRef) -> Option<String> {
        let raw = card
            .select(&self.selector)
            .next()?
            .value()
            .attr(self.attribute)?;

        let value = match self.kind {
            AttrKind::Plain => raw.trim(),
            AttrKind::SrcSet => first_srcset_candidate(raw)?,
        };

        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Tries each attempt in order and returns the first present value.
    pub fn first_resolved(attempts: &[Attempt], card: &ElementRef) -> Option<String> {
        attempts.iter().find_map(|attempt| attempt.resolve(card))
    }
}

/// Turns scheme- and root-relative URLs into absolute ones.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    origin: String,
}

impl UrlNormalizer {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    /// Image URLs: both `//host/path` and `/path` become absolute.
    pub fn cover(&self, url: String) -> String {
        if url.starts_with("//") {
            format!("https:{}", url)
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            url
        }
    }

    /// Links: only `//host/path` is rewritten. Root-relative links stay
    /// as they are, unlike covers.
    pub fn href(&self, url: String) -> String {
        if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url
        }
    }
}
