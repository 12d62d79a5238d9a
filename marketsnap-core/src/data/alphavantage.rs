//! Alpha Vantage quote source.
//!
//! Uses `GLOBAL_QUOTE` for the latest session and `TIME_SERIES_DAILY` when an
//! as-of date is requested. The free tier allows 5 calls per minute and 25 per
//! day. The resolver spaces calls through its rate limiter, so per-minute
//! throttling should only show up when another client shares the key; the
//! daily quota and the demo key come back with a day-long retry hint.
//!
//! Alpha Vantage can't quote indices, so index symbols are routed to their ETF proxy.

use super::http;
use super::provider::{
    FetchError, ProxyTable, QuoteRequest, QuoteSource, Route, DAILY_QUOTA_RETRY_SECS,
};
use crate::config::AlphaVantageSettings;
use crate::domain::{PriceMove, Quote, SourceId, SymbolClass};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    status: StatusFields,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(flatten)]
    status: StatusFields,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

/// Throttle and error messages Alpha Vantage returns with HTTP 200.
#[derive(Debug, Default, Deserialize)]
struct StatusFields {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

/// Per-minute throttling clears within a minute.
const PER_MINUTE_RETRY_SECS: u64 = 60;

/// `Information` is also how the daily quota and the demo key are reported;
/// neither clears within the run.
fn is_daily_limit(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("per day") || message.contains("demo")
}

impl StatusFields {
    fn check(&self, ticker: &str) -> Result<(), FetchError> {
        if let Some(info) = &self.information {
            let retry_after_secs = if is_daily_limit(info) {
                DAILY_QUOTA_RETRY_SECS
            } else {
                PER_MINUTE_RETRY_SECS
            };
            return Err(FetchError::RateLimited {
                retry_after_secs: Some(retry_after_secs),
            });
        }
        if self.note.is_some() {
            return Err(FetchError::RateLimited {
                retry_after_secs: Some(PER_MINUTE_RETRY_SECS),
            });
        }
        if self.error_message.is_some() {
            return Err(FetchError::not_found(ticker));
        }
        Ok(())
    }
}

pub struct AlphaVantageSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageSource {
    pub fn new(settings: &AlphaVantageSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(settings.timeout_secs))?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.resolved_api_key(),
        })
    }

    fn query_url(&self, function: &str, ticker: &str) -> String {
        let mut url = format!(
            "{}/query?function={function}&symbol={ticker}&apikey={}",
            self.base_url, self.api_key
        );
        if function == "TIME_SERIES_DAILY" {
            url.push_str("&outputsize=compact");
        }
        url
    }
}

fn parse_number(ticker: &str, field: &str, raw: Option<&str>) -> Result<f64, FetchError> {
    let raw = raw.ok_or_else(|| FetchError::Parse(format!("{ticker}: missing {field}")))?;
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|e| FetchError::Parse(format!("{ticker}: bad {field} '{raw}': {e}")))
}

/// Parse a `GLOBAL_QUOTE` payload.
pub fn parse_global_quote(ticker: &str, body: &str) -> Result<PriceMove, FetchError> {
    let resp: GlobalQuoteResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("GLOBAL_QUOTE for {ticker}: {e}")))?;
    resp.status.check(ticker)?;

    let quote = resp.global_quote.unwrap_or_default();
    if quote.price.is_none() {
        // `"Global Quote": {}` is how unknown symbols come back.
        return Err(FetchError::not_found(ticker));
    }

    let price = parse_number(ticker, "price", quote.price.as_deref())?;
    if price <= 0.0 {
        return Err(FetchError::not_found(ticker));
    }
    let change = parse_number(ticker, "change", quote.change.as_deref())?;
    let change_pct = parse_number(ticker, "change percent", quote.change_percent.as_deref())?;
    let session = quote
        .latest_trading_day
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(PriceMove::new(price, change, change_pct, session)?)
}

/// Parse a `TIME_SERIES_DAILY` payload into the move ending on or before `as_of`.
pub fn parse_daily_series(
    ticker: &str,
    body: &str,
    as_of: Option<NaiveDate>,
) -> Result<PriceMove, FetchError> {
    let resp: DailySeriesResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("TIME_SERIES_DAILY for {ticker}: {e}")))?;
    resp.status.check(ticker)?;

    let series = resp
        .series
        .ok_or_else(|| FetchError::Parse(format!("{ticker}: no daily series in response")))?;

    let mut closes = Vec::with_capacity(series.len());
    for (day, bar) in &series {
        let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
            continue;
        };
        if as_of.is_some_and(|cutoff| date > cutoff) {
            continue;
        }
        closes.push((date, parse_number(ticker, "close", Some(&bar.close))?));
    }
    closes.sort_by_key(|(date, _)| *date);

    match closes.as_slice() {
        [.., (_, prev), (date, last)] => Ok(PriceMove::from_closes(*last, *prev, Some(*date))?),
        _ => Err(FetchError::not_found(ticker)),
    }
}

impl QuoteSource for AlphaVantageSource {
    fn id(&self) -> SourceId {
        SourceId::AlphaVantage
    }

    fn route(&self, symbol: &str, class: SymbolClass, proxies: &ProxyTable) -> Route {
        match class {
            SymbolClass::Index => proxies
                .get(symbol)
                .map(|etf| Route::Proxy(etf.clone()))
                .unwrap_or(Route::Unsupported),
            // Exchange-suffixed listings (.SS, .HK, ...) aren't on the free tier.
            SymbolClass::Equity if symbol.contains('.') => Route::Unsupported,
            SymbolClass::Equity => Route::Direct(symbol.replace('-', ".")),
        }
    }

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError> {
        let price = match request.as_of {
            None => {
                let url = self.query_url("GLOBAL_QUOTE", &request.ticker);
                let body = http::get_text(&self.client, &url, &request.ticker)?;
                parse_global_quote(&request.ticker, &body)?
            }
            Some(as_of) => {
                let url = self.query_url("TIME_SERIES_DAILY", &request.ticker);
                let body = http::get_text(&self.client, &url, &request.ticker)?;
                parse_daily_series(&request.ticker, &body, Some(as_of))?
            }
        };
        Ok(request.quote(SourceId::AlphaVantage, price))
    }
}
