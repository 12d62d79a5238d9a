//! Shared helpers for integration tests: scripted in-memory quote sources
//! and throwaway cache files. Nothing here touches the network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use marketsnap_core::data::{FetchError, ProxyTable, QuoteRequest, QuoteSource, Route};
use marketsnap_core::domain::{PriceMove, Quote, SourceId, SymbolClass};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh cache file path under the system temp dir (file not created).
pub fn temp_cache_path(label: &str) -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "marketsnap_{label}_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("cache.json")
}

pub fn session() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 5).unwrap()
}

pub fn price(close: f64, change: f64, change_pct: f64) -> PriceMove {
    price_on(session(), close, change, change_pct)
}

pub fn price_on(day: NaiveDate, close: f64, change: f64, change_pct: f64) -> PriceMove {
    PriceMove::new(close, change, change_pct, Some(day)).unwrap()
}

/// Which symbols a scripted source claims it can serve.
#[derive(Clone)]
pub enum Routing {
    /// Every symbol, queried as-is.
    All,
    /// Indices only through the proxy table; equities as-is.
    IndexViaProxy,
    /// Only these symbols, queried as-is.
    Only(Vec<&'static str>),
}

/// A quote source that replays scripted responses per upstream ticker.
///
/// Responses are consumed in order; the last one repeats. Tickers without a
/// script answer `NotFound`. Every fetch is recorded in `calls`.
pub struct ScriptedSource {
    id: SourceId,
    routing: Routing,
    script: Mutex<HashMap<String, VecDeque<Result<PriceMove, FetchError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(id: SourceId, routing: Routing) -> Self {
        Self {
            id,
            routing,
            script: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn respond(self, ticker: &str, response: Result<PriceMove, FetchError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(ticker.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl QuoteSource for ScriptedSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn route(&self, symbol: &str, class: SymbolClass, proxies: &ProxyTable) -> Route {
        match &self.routing {
            Routing::All => Route::Direct(symbol.to_string()),
            Routing::IndexViaProxy => match class {
                SymbolClass::Index => proxies
                    .get(symbol)
                    .map_or(Route::Unsupported, |p| Route::Proxy(p.clone())),
                SymbolClass::Equity => Route::Direct(symbol.to_string()),
            },
            Routing::Only(symbols) if symbols.contains(&symbol) => {
                Route::Direct(symbol.to_string())
            }
            Routing::Only(_) => Route::Unsupported,
        }
    }

    fn fetch(&self, request: &QuoteRequest) -> Result<Quote, FetchError> {
        self.calls.lock().unwrap().push(request.ticker.clone());
        let mut script = self.script.lock().unwrap();
        let response = match script.get_mut(&request.ticker) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::not_found(&request.ticker))),
            None => Err(FetchError::not_found(&request.ticker)),
        };
        response.map(|mv| request.quote(self.id, mv))
    }
}

pub fn calls_of(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    calls.lock().unwrap().clone()
}
