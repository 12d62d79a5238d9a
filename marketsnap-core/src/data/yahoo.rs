//! Yahoo Finance backup source.
//!
//! Fetches recent daily closes from Yahoo's v8 chart API and derives the last
//! session's move. Yahoo quotes indices directly, so no proxy is needed.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes;
//! it sits last in the default chains for that reason.

use super::http;
use super::provider::{FetchError, ProxyTable, QuoteRequest, QuoteSource, Route};
use crate::config::YahooSettings;
use crate::domain::{PriceMove, Quote, SourceId, SymbolClass};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// Sessions requested around the target date; enough to span long holidays.
const LOOKBACK_DAYS: i64 = 10;

pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(settings: &YahooSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(settings.timeout_secs))?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a ticker and date range.
    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = (end + ChronoDuration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{ticker}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url
        )
    }
}

/// Parse the chart API response into the move between the last two sessions
/// on or before `as_of`.
pub fn parse_chart(
    ticker: &str,
    body: &str,
    as_of: Option<NaiveDate>,
) -> Result<PriceMove, FetchError> {
    let resp: ChartResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("failed to parse chart for {ticker}: {e}")))?;

    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => FetchError::not_found(ticker),
        Some(err) => FetchError::Parse(format!("{}: {}", err.code, err.description)),
        None => FetchError::Parse("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Parse("result array is empty".into()))?;

    // A valid symbol with no sessions in range has no timestamp array.
    let timestamps = data.timestamp.unwrap_or_default();

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Parse("no quote data".into()))?;

    let mut closes = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| FetchError::Parse(format!("invalid timestamp: {ts}")))?;
        if as_of.is_some_and(|cutoff| date > cutoff) {
            continue;
        }
        // Holidays come back as nulls.
        if let Some(close) = quote.close.get(i).copied().flatten() {
            closes.push((date, close));
        }
    }

    match closes.as_slice() {
        [.., (_, prev), (date, last)] => Ok(PriceMove::from_closes(*last, *prev, Some(*date))?),
        _ => Err(FetchError::not_found(ticker)),
    }
}

impl QuoteSource for YahooSource {
    fn id(&self) -> SourceId {
        SourceId::YFinance
    }

    fn route(&self, symbol: &str, _class: SymbolClass, _proxies: &ProxyTable) -> Route {
        Route::Direct(symbol.to_string())
    }

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError> {
        let end = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let start = end - ChronoDuration::days(LOOKBACK_DAYS);
        let url = self.chart_url(&request.ticker, start, end);
        let body = http::get_text(&self.client, &url, &request.ticker)?;
        let price = parse_chart(&request.ticker, &body, request.as_of)?;
        Ok(request.quote(SourceId::YFinance, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-12-03/04/05 00:00 UTC, with a null close on the middle day.
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "^HSI", "currency": "HKD"},
                "timestamp": [1764720000, 1764806400, 1764892800],
                "indicators": {
                    "quote": [{
                        "open": [25900.0, null, 26000.0],
                        "close": [25935.41, null, 26085.08],
                        "volume": [0, null, 0]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn skips_null_sessions() {
        let mv = parse_chart("^HSI", CHART, None).unwrap();
        assert_eq!(mv.close, 26085.08);
        assert_eq!(mv.session, NaiveDate::from_ymd_opt(2025, 12, 5));
        assert!(mv.change > 0.0 && mv.change_pct > 0.0);
    }

    #[test]
    fn as_of_excludes_later_sessions() {
        let err = parse_chart("^HSI", CHART, NaiveDate::from_ymd_opt(2025, 12, 4)).unwrap_err();
        // Only one usable close remains.
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn chart_error_not_found() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert!(matches!(
            parse_chart("ZZZZ", body, None),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn other_chart_error_is_parse_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Bad Request", "description": "Invalid input"}}}"#;
        assert!(matches!(
            parse_chart("X", body, None),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn chart_url_spans_requested_range() {
        let source = YahooSource::new(&YahooSettings::default()).unwrap();
        let url = source.chart_url(
            "^GSPC",
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 5).unwrap(),
        );
        assert!(url.starts_with("https://query2.finance.yahoo.com/v8/finance/chart/^GSPC?"));
        assert!(url.contains("period1=1764547200"));
        assert!(url.contains("period2=1764979200"));
    }
}
