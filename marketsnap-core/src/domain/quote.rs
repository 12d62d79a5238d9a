//! Quote: one normalized daily price observation for a symbol.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which upstream produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Cache,
    Stooq,
    AlphaVantage,
    YFinance,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Cache => "cache",
            SourceId::Stooq => "stooq",
            SourceId::AlphaVantage => "alphavantage",
            SourceId::YFinance => "yfinance",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source identifier plus the proxy ticker actually queried, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTag {
    pub id: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl SourceTag {
    pub fn direct(id: SourceId) -> Self {
        Self { id, proxy: None }
    }

    pub fn via_proxy(id: SourceId, proxy: impl Into<String>) -> Self {
        Self {
            id,
            proxy: Some(proxy.into()),
        }
    }

    pub fn cache() -> Self {
        Self::direct(SourceId::Cache)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.proxy {
            Some(proxy) => write!(f, "{}({proxy})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Index vs single equity. Selects the fallback chain and proxy handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolClass {
    Index,
    Equity,
}

/// Rejected price data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidQuote {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("non-positive price: {0}")]
    NonPositivePrice(f64),

    #[error("change {change} and percent change {change_pct}% disagree in sign")]
    SignMismatch { change: f64, change_pct: f64 },
}

/// Close, absolute change and percent change for one session.
///
/// Construction enforces that `change` and `change_pct` carry the same sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceMove {
    pub close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub session: Option<NaiveDate>,
}

const ZERO_EPS: f64 = 1e-9;

impl PriceMove {
    pub fn new(
        close: f64,
        change: f64,
        change_pct: f64,
        session: Option<NaiveDate>,
    ) -> Result<Self, InvalidQuote> {
        for (field, value) in [("close", close), ("change", change), ("change_pct", change_pct)] {
            if !value.is_finite() {
                return Err(InvalidQuote::NonFinite { field });
            }
        }
        if close <= 0.0 {
            return Err(InvalidQuote::NonPositivePrice(close));
        }
        let disagree = change.abs() > ZERO_EPS
            && change_pct.abs() > ZERO_EPS
            && change.signum() != change_pct.signum();
        if disagree {
            return Err(InvalidQuote::SignMismatch { change, change_pct });
        }
        Ok(Self {
            close,
            change,
            change_pct,
            session,
        })
    }

    /// Derive the move from the last two closes.
    pub fn from_closes(
        last: f64,
        prev: f64,
        session: Option<NaiveDate>,
    ) -> Result<Self, InvalidQuote> {
        if !prev.is_finite() {
            return Err(InvalidQuote::NonFinite { field: "previous close" });
        }
        if prev <= 0.0 {
            return Err(InvalidQuote::NonPositivePrice(prev));
        }
        let change = last - prev;
        let change_pct = (last / prev - 1.0) * 100.0;
        Self::new(last, change, change_pct, session)
    }
}

/// A normalized quote. `symbol` is always the symbol that was asked for,
/// even when a proxy ticker was queried upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub source: SourceTag,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<NaiveDate>,
}

impl Quote {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: PriceMove,
        source: SourceTag,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            close: price.close,
            change: price.change,
            change_pct: price.change_pct,
            source,
            fetched_at,
            session: price.session,
        }
    }

    /// Re-tag a quote that is being served from the cache.
    pub fn into_cached(mut self) -> Self {
        self.source = SourceTag::cache();
        self
    }

    pub fn price_move(&self) -> PriceMove {
        PriceMove {
            close: self.close,
            change: self.change,
            change_pct: self.change_pct,
            session: self.session,
        }
    }
}
