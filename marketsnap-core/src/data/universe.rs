//! Movers universes: the constituents scanned for top gainers/losers.
//!
//! A universe is read from `<dir>/<market stem>.csv` (`ticker` column required,
//! `name` optional) when that file exists. Without one, the constituents table
//! of the index's Wikipedia article is scraped when a client is supplied, and
//! the built-in list is the last fallback.

use super::http;
use super::provider::FetchError;
use crate::domain::Market;
use log::{debug, warn};
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe CSV has no 'ticker' column")]
    MissingTickerColumn,

    #[error("constituents page: {0}")]
    Fetch(#[from] FetchError),

    #[error("no table with a ticker column in the constituents page")]
    NoTickerTable,

    #[error("no constituents page for {0}")]
    NoPage(Market),

    #[error("invalid selector {0}")]
    Selector(String),
}

/// Articles whose first ticker table lists the benchmark's members.
pub fn wikipedia_url(market: Market) -> Option<&'static str> {
    match market {
        Market::Us => Some("https://en.wikipedia.org/wiki/Nasdaq-100"),
        Market::Hk => Some("https://en.wikipedia.org/wiki/Hang_Seng_Index"),
        Market::Cn => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituent {
    pub ticker: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub market: Market,
    pub members: Vec<Constituent>,
}

impl Universe {
    /// Parse a constituents CSV. Blank tickers are dropped, duplicates keep the first row.
    pub fn from_csv_reader<R: Read>(market: Market, reader: R) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        };
        let ticker_col = find("ticker").ok_or(UniverseError::MissingTickerColumn)?;
        let name_col = find("name");

        let mut seen = HashSet::new();
        let mut members = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let ticker = record.get(ticker_col).unwrap_or_default().trim();
            if ticker.is_empty() || !seen.insert(ticker.to_string()) {
                continue;
            }
            let name = name_col
                .and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(ticker);
            members.push(Constituent {
                ticker: ticker.to_string(),
                name: name.to_string(),
            });
        }
        Ok(Self { market, members })
    }

    pub fn from_csv_path(market: Market, path: &Path) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_csv_reader(market, file)
    }

    /// Constituents CSV from `dir`, then Wikipedia (only with a `wiki` client),
    /// then the built-in list.
    pub fn load(market: Market, dir: Option<&Path>, wiki: Option<&Client>) -> Self {
        if let Some(dir) = dir {
            let path = dir.join(format!("{}.csv", market.constituents_stem()));
            if path.exists() {
                match Self::from_csv_path(market, &path) {
                    Ok(u) if !u.members.is_empty() => {
                        debug!("{market}: {} constituents from {}", u.len(), path.display());
                        return u;
                    }
                    Ok(_) => warn!("{} lists no tickers", path.display()),
                    Err(e) => warn!("{}: {e}", path.display()),
                }
            }
        }
        if let (Some(client), Some(_)) = (wiki, wikipedia_url(market)) {
            match Self::from_wikipedia(market, client) {
                Ok(u) if !u.members.is_empty() => {
                    debug!("{market}: {} constituents from Wikipedia", u.len());
                    return u;
                }
                Ok(_) => warn!("{market}: Wikipedia table lists no tickers"),
                Err(e) => warn!("{market}: {e}"),
            }
        }
        debug!("{market}: using built-in constituents");
        Self::builtin(market)
    }

    pub fn from_wikipedia(market: Market, client: &Client) -> Result<Self, UniverseError> {
        let url = wikipedia_url(market).ok_or(UniverseError::NoPage(market))?;
        let html = http::get_text(client, url, market.benchmark())?;
        Self::from_wikipedia_html(market, &html)
    }

    /// Members from the first table whose header has a ticker or symbol column.
    ///
    /// US tickers use `-` for share classes (`BRK.B` → `BRK-B`); Hong Kong
    /// codes are zero-padded to four digits with a `.HK` suffix.
    pub fn from_wikipedia_html(market: Market, html: &str) -> Result<Self, UniverseError> {
        let doc = Html::parse_document(html);
        let (table_sel, row_sel, cell_sel) = (css("table")?, css("tr")?, css("th, td")?);

        for table in doc.select(&table_sel) {
            let mut rows = table.select(&row_sel);
            let Some(header) = rows.next() else {
                continue;
            };
            let headers: Vec<String> = header
                .select(&cell_sel)
                .map(|c| cell_text(c).to_lowercase())
                .collect();
            let Some(ticker_col) = headers
                .iter()
                .position(|h| h.contains("ticker") || h.contains("symbol"))
            else {
                continue;
            };
            let name_col = headers.iter().position(|h| {
                h == "name" || h.contains("company") || h.contains("security")
            });

            let mut seen = HashSet::new();
            let mut members = Vec::new();
            for row in rows {
                let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
                let Some(raw) = cells.get(ticker_col) else {
                    continue;
                };
                let Some(ticker) = normalize_ticker(market, raw) else {
                    continue;
                };
                if !seen.insert(ticker.clone()) {
                    continue;
                }
                let name = name_col
                    .and_then(|c| cells.get(c))
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| ticker.clone());
                members.push(Constituent { ticker, name });
            }
            return Ok(Self { market, members });
        }
        Err(UniverseError::NoTickerTable)
    }

    /// Built-in constituents (largest members of each benchmark).
    pub fn builtin(market: Market) -> Self {
        let pairs: &[(&str, &str)] = match market {
            Market::Us => &[
                ("AAPL", "Apple"),
                ("MSFT", "Microsoft"),
                ("NVDA", "NVIDIA"),
                ("AMZN", "Amazon"),
                ("META", "Meta Platforms"),
                ("AVGO", "Broadcom"),
                ("GOOGL", "Alphabet Class A"),
                ("GOOG", "Alphabet Class C"),
                ("TSLA", "Tesla"),
                ("COST", "Costco"),
                ("NFLX", "Netflix"),
                ("AMD", "Advanced Micro Devices"),
                ("PEP", "PepsiCo"),
                ("ADBE", "Adobe"),
                ("CSCO", "Cisco"),
                ("TMUS", "T-Mobile US"),
                ("INTC", "Intel"),
                ("QCOM", "Qualcomm"),
                ("TXN", "Texas Instruments"),
                ("INTU", "Intuit"),
                ("AMGN", "Amgen"),
                ("ISRG", "Intuitive Surgical"),
                ("HON", "Honeywell"),
                ("BKNG", "Booking Holdings"),
                ("PLTR", "Palantir"),
            ],
            Market::Cn => &[
                ("600519.SS", "Kweichow Moutai"),
                ("601398.SS", "ICBC"),
                ("600036.SS", "China Merchants Bank"),
                ("600276.SS", "Jiangsu Hengrui"),
                ("300750.SZ", "CATL"),
                ("000333.SZ", "Midea Group"),
                ("000858.SZ", "Wuliangye"),
                ("601318.SS", "Ping An Insurance"),
                ("600887.SS", "Yili"),
                ("601888.SS", "China Tourism Group"),
            ],
            Market::Hk => &[
                ("0700.HK", "Tencent"),
                ("9988.HK", "Alibaba"),
                ("0005.HK", "HSBC Holdings"),
                ("1299.HK", "AIA Group"),
                ("0939.HK", "China Construction Bank"),
                ("3690.HK", "Meituan"),
                ("0941.HK", "China Mobile"),
                ("1810.HK", "Xiaomi"),
                ("0388.HK", "Hong Kong Exchanges"),
                ("2318.HK", "Ping An Insurance"),
            ],
        };
        Self {
            market,
            members: pairs
                .iter()
                .map(|(ticker, name)| Constituent {
                    ticker: ticker.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    /// Keep the first `max` members.
    pub fn truncated(mut self, max: usize) -> Self {
        self.members.truncate(max);
        self
    }

    /// `(ticker, name)` pairs in universe order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.members
            .iter()
            .map(|c| (c.ticker.as_str(), c.name.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn css(selector: &str) -> Result<Selector, UniverseError> {
    Selector::parse(selector).map_err(|e| UniverseError::Selector(format!("{selector}: {e}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_ticker(market: Market, raw: &str) -> Option<String> {
    let raw = raw.trim();
    match market {
        Market::Hk => {
            let digits: String = raw
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect();
            (!digits.is_empty()).then(|| format!("{digits:0>4}.HK"))
        }
        _ => (!raw.is_empty()).then(|| raw.replace('.', "-")),
    }
}
