//! Stooq daily CSV source.
//!
//! `GET {base}/q/d/l/?s={ticker}&i=d` returns the full daily history as
//! `Date,Open,High,Low,Close,Volume`. The quote is the last close against the
//! one before it. Stooq signals its daily quota with a plain-text body instead
//! of an HTTP status, so the body is inspected before parsing.

use super::http;
use super::provider::{
    FetchError, ProxyTable, QuoteRequest, QuoteSource, Route, DAILY_QUOTA_RETRY_SECS,
};
use crate::config::StooqSettings;
use crate::domain::{PriceMove, Quote, SourceId, SymbolClass};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const QUOTA_EXCEEDED: &str = "Exceeded the daily hits limit";

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Close")]
    close: Option<f64>,
}

pub struct StooqSource {
    client: Client,
    base_url: String,
    symbols: BTreeMap<String, String>,
}

impl StooqSource {
    pub fn new(settings: &StooqSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(settings.timeout_secs))?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            symbols: settings.symbols.clone(),
        })
    }

    fn daily_url(&self, ticker: &str) -> String {
        format!("{}/q/d/l/?s={ticker}&i=d", self.base_url)
    }
}

/// Stooq spelling for a plain US ticker (`BRK-B` → `brk-b.us`).
fn us_equity_ticker(symbol: &str) -> Option<String> {
    let plain = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    plain.then(|| format!("{}.us", symbol.to_ascii_lowercase()))
}

/// Parse a Stooq daily CSV into the move between the last two sessions
/// on or before `as_of`.
pub fn parse_daily_csv(
    ticker: &str,
    body: &str,
    as_of: Option<NaiveDate>,
) -> Result<PriceMove, FetchError> {
    let body = body.trim();
    if body.starts_with(QUOTA_EXCEEDED) {
        return Err(FetchError::RateLimited {
            retry_after_secs: Some(DAILY_QUOTA_RETRY_SECS),
        });
    }
    if body.is_empty() || body.eq_ignore_ascii_case("no data") {
        return Err(FetchError::not_found(ticker));
    }
    if !body.starts_with("Date,") {
        return Err(FetchError::Parse(format!(
            "unexpected Stooq response for {ticker}: {}",
            body.lines().next().unwrap_or_default()
        )));
    }

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| FetchError::Parse(format!("Stooq header for {ticker}: {e}")))?;
    if !headers.iter().any(|h| h == "Close") {
        return Err(FetchError::Parse(format!("no Close column for {ticker}")));
    }

    let mut closes: Vec<(NaiveDate, f64)> = Vec::new();
    for row in reader.deserialize::<DailyRow>() {
        let row = row.map_err(|e| FetchError::Parse(format!("Stooq row for {ticker}: {e}")))?;
        let Ok(date) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") else {
            continue;
        };
        let Some(close) = row.close else {
            continue;
        };
        if as_of.is_some_and(|cutoff| date > cutoff) {
            continue;
        }
        closes.push((date, close));
    }
    closes.sort_by_key(|(date, _)| *date);

    match closes.as_slice() {
        [.., (_, prev), (date, last)] => Ok(PriceMove::from_closes(*last, *prev, Some(*date))?),
        _ => Err(FetchError::not_found(ticker)),
    }
}

impl QuoteSource for StooqSource {
    fn id(&self) -> SourceId {
        SourceId::Stooq
    }

    fn route(&self, symbol: &str, class: SymbolClass, _proxies: &ProxyTable) -> Route {
        if let Some(ticker) = self.symbols.get(symbol) {
            return Route::Direct(ticker.clone());
        }
        match class {
            // Regional indices Stooq doesn't carry are skipped outright.
            SymbolClass::Index => Route::Unsupported,
            SymbolClass::Equity => us_equity_ticker(symbol)
                .map(Route::Direct)
                .unwrap_or(Route::Unsupported),
        }
    }

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError> {
        let body = http::get_text(&self.client, &self.daily_url(&request.ticker), &request.ticker)?;
        let price = parse_daily_csv(&request.ticker, &body, request.as_of)?;
        Ok(request.quote(SourceId::Stooq, price))
    }
}
