//! Quote source trait and structured fetch errors.
//!
//! The QuoteSource trait abstracts over upstream providers (Stooq, Alpha Vantage,
//! Yahoo Finance) so the fallback chain can be reordered and mocked for tests.
//! The cache sits above this trait; sources don't know about it.

use crate::domain::{InvalidQuote, PriceMove, Quote, SourceId, SourceTag, SymbolClass};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Index symbol → tradable ETF ticker.
pub type ProxyTable = BTreeMap<String, String>;

/// Retry hint for quota replies that only reset the next day.
pub const DAILY_QUOTA_RETRY_SECS: u64 = 24 * 60 * 60;

/// Failure of a single fetch against a single source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("rate limited by provider{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

impl FetchError {
    pub fn not_found(symbol: impl Into<String>) -> Self {
        FetchError::NotFound {
            symbol: symbol.into(),
        }
    }

    /// Transient failures that get one more try against the same source.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Parse(_))
    }
}

impl From<InvalidQuote> for FetchError {
    fn from(e: InvalidQuote) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// How a source wants to be asked about a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Query this ticker (possibly a provider-specific spelling of the symbol).
    Direct(String),
    /// Query this ETF proxy in place of an index the source can't quote.
    Proxy(String),
    /// The source can't serve the symbol; skip it without a network call.
    Unsupported,
}

/// One fetch request, carrying both the caller's identity and the upstream ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    /// Symbol the caller asked for; the resulting quote keeps it.
    pub symbol: String,
    pub name: String,
    /// Ticker sent upstream.
    pub ticker: String,
    pub proxied: bool,
    /// Quote the last session on or before this date instead of the latest.
    pub as_of: Option<NaiveDate>,
}

impl QuoteRequest {
    pub fn new(symbol: &str, name: &str, route_ticker: &str, proxied: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            ticker: route_ticker.to_string(),
            proxied,
            as_of: None,
        }
    }

    pub fn as_of(mut self, date: Option<NaiveDate>) -> Self {
        self.as_of = date;
        self
    }

    /// Build the normalized quote for this request.
    pub fn quote(&self, source: SourceId, price: PriceMove) -> Quote {
        let tag = if self.proxied {
            SourceTag::via_proxy(source, &self.ticker)
        } else {
            SourceTag::direct(source)
        };
        let name = if self.name.is_empty() {
            self.symbol.as_str()
        } else {
            self.name.as_str()
        };
        Quote::new(&self.symbol, name, price, tag, Utc::now())
    }
}

/// An upstream quote provider.
pub trait QuoteSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Decide what (if anything) to query for `symbol`.
    fn route(&self, symbol: &str, class: SymbolClass, proxies: &ProxyTable) -> Route;

    /// Fetch the latest (or as-of) daily quote.
    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError>;
}
