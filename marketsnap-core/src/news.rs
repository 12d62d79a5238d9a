//! Newsroom headlines scraped from HTML cards.
//!
//! Each card carries a title, a one-paragraph summary, a `source · time` meta
//! line, an importance badge (colour coded), a sentiment label and a list of
//! related tickers (`AMZN.US`, `0700.HK`). Labels may be Korean or English.

use crate::config::NewsConfig;
use crate::data::http;
use crate::data::provider::FetchError;
use log::{debug, warn};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("newsroom fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "HIGH" | "높음" => Some(Self::High),
            "MEDIUM" | "MED" | "중간" => Some(Self::Medium),
            "LOW" | "낮음" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "긍정" | "positive" => Some(Self::Positive),
            "부정" | "negative" => Some(Self::Negative),
            "중립" | "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Positive => "📈",
            Self::Negative => "📉",
            Self::Neutral => "➡️",
        }
    }

    /// Single-character arrow used in compact digests.
    pub fn arrow(&self) -> &'static str {
        match self {
            Self::Positive => "↑",
            Self::Negative => "↓",
            Self::Neutral => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub time: String,
    pub importance: Option<Importance>,
    pub sentiment: Option<Sentiment>,
    pub tickers: Vec<String>,
}

impl NewsItem {
    pub fn is_important(&self) -> bool {
        self.importance == Some(Importance::High)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewsOptions {
    pub limit: usize,
    pub important_only: bool,
}

impl Default for NewsOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            important_only: false,
        }
    }
}

const CARD: &str = ".group.p-4.rounded-xl.border";
const CARD_FALLBACK: &str = "[class*='group'][class*='p-4'][class*='rounded-xl']";
const TITLE: &str = ".text-sm.mb-2.line-clamp-2";
const SUMMARY: &str = ".text-xs.text-muted-foreground.line-clamp-2.mb-3";
const META: &str = ".flex.items-center.gap-2.mb-2";
const IMPORTANCE: &str =
    "[class*='bg-red-500'], [class*='bg-yellow-500'], [class*='bg-green-500']";
const SENTIMENT: &str =
    ".flex.items-center.gap-2.flex-wrap span, .flex.items-center.gap-2.flex-wrap div";
const TICKERS: &str =
    "[class*='change-positive'], [class*='change-negative'], [class*='change-neutral']";

struct Selectors {
    card: Selector,
    card_fallback: Selector,
    title: Selector,
    summary: Selector,
    meta: Selector,
    importance: Selector,
    sentiment: Selector,
    tickers: Selector,
}

impl Selectors {
    fn new() -> Result<Self, NewsError> {
        Ok(Self {
            card: selector(CARD)?,
            card_fallback: selector(CARD_FALLBACK)?,
            title: selector(TITLE)?,
            summary: selector(SUMMARY)?,
            meta: selector(META)?,
            importance: selector(IMPORTANCE)?,
            sentiment: selector(SENTIMENT)?,
            tickers: selector(TICKERS)?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, NewsError> {
    Selector::parse(css).map_err(|e| NewsError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Collapse an element's text nodes into one whitespace-normalized line.
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(card: ElementRef<'_>, sel: &Selector) -> String {
    card.select(sel).next().map(text_of).unwrap_or_default()
}

fn parse_card(card: ElementRef<'_>, sel: &Selectors) -> Option<NewsItem> {
    let title = first_text(card, &sel.title);
    if title.is_empty() {
        return None;
    }

    let meta = first_text(card, &sel.meta);
    let mut parts = meta.split('·').map(str::trim);
    let source = parts.next().unwrap_or_default().to_string();
    let time = parts.next().unwrap_or_default().to_string();

    let importance = card
        .select(&sel.importance)
        .next()
        .and_then(|el| Importance::parse(&text_of(el)));
    let sentiment = card
        .select(&sel.sentiment)
        .find_map(|el| Sentiment::parse(&text_of(el)));

    let mut tickers: Vec<String> = Vec::new();
    for el in card.select(&sel.tickers) {
        let t = text_of(el);
        if t.contains('.') && !tickers.contains(&t) {
            tickers.push(t);
        }
    }

    Some(NewsItem {
        title,
        summary: first_text(card, &sel.summary),
        source,
        time,
        importance,
        sentiment,
        tickers,
    })
}

/// Parse newsroom HTML. Cards without a title are dropped; the importance
/// filter runs before the limit.
pub fn parse_newsroom(html: &str, opts: NewsOptions) -> Result<Vec<NewsItem>, NewsError> {
    let sel = Selectors::new()?;
    let doc = Html::parse_document(html);

    let mut cards: Vec<ElementRef<'_>> = doc.select(&sel.card).collect();
    if cards.is_empty() {
        cards = doc.select(&sel.card_fallback).collect();
    }
    debug!("{} news cards found", cards.len());

    Ok(cards
        .into_iter()
        .filter_map(|card| parse_card(card, &sel))
        .filter(|item| !opts.important_only || item.is_important())
        .take(opts.limit)
        .collect())
}

pub struct NewsClient {
    client: Client,
    url: String,
}

impl NewsClient {
    pub fn new(config: &NewsConfig) -> Result<Self, NewsError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            url: config.url.clone(),
        })
    }

    pub fn fetch(&self, opts: NewsOptions) -> Result<Vec<NewsItem>, NewsError> {
        let body = http::get_text(&self.client, &self.url, "newsroom")?;
        let items = parse_newsroom(&body, opts)?;
        if items.is_empty() {
            // The page renders client-side; a bare shell has no cards.
            warn!("no headlines found at {}", self.url);
        }
        Ok(items)
    }
}
