//! Fallback resolver: walks the per-class source chain for each symbol.
//!
//! Policy per symbol:
//! 1. Already resolved in this run → memoized quote (no network)
//! 2. Fast mode and a fresh cache entry → cached quote (no network)
//! 3. Sources in chain order, skipping those that can't route the symbol;
//!    network/parse failures get one retry, rate limits put that source's
//!    limiter into cool-down and move on to the next source
//! 4. First success is written to the cache (unless the cache already holds a
//!    later session) and returned
//! 5. Everything failed → stale cache entry tagged `cache`, else
//!    `AllSourcesExhausted`
//!
//! With an as-of date, fast mode only serves an entry for exactly that
//! session and the stale fallback only entries on or before it.
//!
//! Batches run sequentially; the Alpha Vantage limiter dominates wall-clock
//! time for a movers scan (roughly 12s per equity).

use super::alphavantage::AlphaVantageSource;
use super::cache::QuoteCache;
use super::provider::{FetchError, ProxyTable, QuoteRequest, QuoteSource, Route};
use super::rate_limit::RateLimiter;
use super::stooq::StooqSource;
use super::yahoo::YahooSource;
use crate::config::{AppConfig, RateLimitSettings};
use crate::domain::{Quote, SourceId, SourceTag, SymbolClass};
use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One failed source attempt for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub source: SourceId,
    pub ticker: String,
    pub error: FetchError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.source, self.ticker, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("all sources exhausted for {symbol}{}", describe_attempts(.attempts))]
    AllSourcesExhausted {
        symbol: String,
        attempts: Vec<Attempt>,
    },
}

fn describe_attempts(attempts: &[Attempt]) -> String {
    if attempts.is_empty() {
        return " (no source could route it)".to_string();
    }
    let parts: Vec<String> = attempts.iter().map(Attempt::to_string).collect();
    format!(" ({})", parts.join("; "))
}

/// Ordered sources per symbol class plus the ETF proxy table.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPlan {
    pub index_chain: Vec<SourceId>,
    pub equity_chain: Vec<SourceId>,
    pub proxies: ProxyTable,
}

impl FallbackPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            index_chain: config.fetch.index_chain.clone(),
            equity_chain: config.fetch.equity_chain.clone(),
            proxies: config.fetch.proxies.clone(),
        }
    }

    pub fn classify(&self, symbol: &str) -> SymbolClass {
        if symbol.starts_with('^') || self.proxies.contains_key(symbol) {
            SymbolClass::Index
        } else {
            SymbolClass::Equity
        }
    }

    pub fn chain(&self, class: SymbolClass) -> &[SourceId] {
        match class {
            SymbolClass::Index => &self.index_chain,
            SymbolClass::Equity => &self.equity_chain,
        }
    }
}

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Serve fresh cache entries without touching the network.
    pub fast: bool,
    pub fresh_window: chrono::Duration,
    /// Longest a rate-limit wait may block before the source is skipped.
    pub max_wait: Duration,
    /// Extra attempts per source for network/parse failures.
    pub retries: u32,
    pub as_of: Option<NaiveDate>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fast: false,
            fresh_window: chrono::Duration::days(2),
            max_wait: Duration::from_secs(90),
            retries: 1,
            as_of: None,
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fast: config.fetch.fast,
            fresh_window: config.cache.fresh_window(),
            max_wait: config.fetch.max_wait(),
            retries: config.fetch.retries,
            as_of: None,
        }
    }
}

/// Progress callback for batch resolution.
pub trait ResolveProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<Quote, ResolveError>,
    );

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes to the log.
pub struct LogProgress;

impl ResolveProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        debug!("[{}/{}] resolving {symbol}", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<Quote, ResolveError>,
    ) {
        match result {
            Ok(q) => info!(
                "[{}/{}] {symbol}: {:.2} ({:+.2}%) via {}",
                index + 1,
                total,
                q.close,
                q.change_pct,
                q.source
            ),
            Err(e) => warn!("[{}/{}] {e}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!("resolved {succeeded}/{total} symbols, {failed} failed");
    }
}

/// Outcome of a batch; quotes keep the input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub quotes: Vec<Quote>,
    pub failures: Vec<(String, ResolveError)>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures.iter().map(|(s, _)| s.as_str()).collect()
    }
}

pub struct QuoteResolver {
    sources: HashMap<SourceId, Box<dyn QuoteSource>>,
    limiters: HashMap<SourceId, Arc<RateLimiter>>,
    cache: QuoteCache,
    plan: FallbackPlan,
    opts: ResolverOptions,
    memo: HashMap<String, Quote>,
}

impl QuoteResolver {
    pub fn new(cache: QuoteCache, plan: FallbackPlan, opts: ResolverOptions) -> Self {
        Self {
            sources: HashMap::new(),
            limiters: HashMap::new(),
            cache,
            plan,
            opts,
            memo: HashMap::new(),
        }
    }

    /// Resolver wired to the real Stooq, Alpha Vantage and Yahoo clients.
    pub fn from_config(
        config: &AppConfig,
        cache: QuoteCache,
        opts: ResolverOptions,
    ) -> Result<Self, FetchError> {
        let sources = &config.sources;
        let limits: [(SourceId, Option<RateLimitSettings>); 3] = [
            (SourceId::Stooq, sources.stooq.rate_limit),
            (SourceId::AlphaVantage, sources.alphavantage.rate_limit),
            (SourceId::YFinance, sources.yfinance.rate_limit),
        ];

        let mut resolver = Self::new(cache, FallbackPlan::from_config(config), opts)
            .with_source(Box::new(StooqSource::new(&sources.stooq)?))
            .with_source(Box::new(AlphaVantageSource::new(&sources.alphavantage)?))
            .with_source(Box::new(YahooSource::new(&sources.yfinance)?));
        for (id, limit) in limits {
            if let Some(limit) = limit {
                resolver = resolver.with_limiter(id, Arc::new(RateLimiter::from_settings(&limit)));
            }
        }
        Ok(resolver)
    }

    /// Register a source (replacing any source with the same id).
    pub fn with_source(mut self, source: Box<dyn QuoteSource>) -> Self {
        self.sources.insert(source.id(), source);
        self
    }

    pub fn with_limiter(mut self, id: SourceId, limiter: Arc<RateLimiter>) -> Self {
        self.limiters.insert(id, limiter);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    pub fn set_as_of(&mut self, as_of: Option<NaiveDate>) {
        if self.opts.as_of != as_of {
            self.memo.clear();
        }
        self.opts.as_of = as_of;
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn into_cache(self) -> QuoteCache {
        self.cache
    }

    pub fn resolve(&mut self, symbol: &str) -> Result<Quote, ResolveError> {
        self.resolve_named(symbol, "")
    }

    /// Resolve one symbol; `name` is the display name carried into the quote.
    pub fn resolve_named(&mut self, symbol: &str, name: &str) -> Result<Quote, ResolveError> {
        if let Some(q) = self.memo.get(symbol) {
            debug!("{symbol}: reusing quote from this run");
            return Ok(q.clone());
        }

        if self.opts.fast && self.cache.is_fresh(symbol, self.opts.fresh_window, Utc::now()) {
            let hit = self
                .cache
                .get(symbol)
                .filter(|q| self.opts.as_of.is_none() || q.session == self.opts.as_of);
            if let Some(q) = hit {
                debug!("{symbol}: fresh cache hit (fast mode)");
                let q = q.into_cached();
                self.memo.insert(symbol.to_string(), q.clone());
                return Ok(q);
            }
        }

        let class = self.plan.classify(symbol);
        let mut attempts = Vec::new();

        for id in self.plan.chain(class).to_vec() {
            let Some(source) = self.sources.get(&id) else {
                debug!("{symbol}: no {id} source registered");
                continue;
            };
            let (ticker, proxied) = match source.route(symbol, class, &self.plan.proxies) {
                Route::Direct(t) => (t, false),
                Route::Proxy(t) => (t, true),
                Route::Unsupported => {
                    debug!("{symbol}: {id} cannot serve it, skipping");
                    continue;
                }
            };

            let request = QuoteRequest::new(symbol, name, &ticker, proxied).as_of(self.opts.as_of);
            let limiter = self.limiters.get(&id).map(Arc::as_ref);
            match fetch_with_retry(source.as_ref(), limiter, &request, &self.opts) {
                Ok(quote) => {
                    let quote = normalize(quote, &request, id);
                    self.remember(symbol, &quote);
                    return Ok(quote);
                }
                Err(error) => {
                    warn!("{symbol}: {id}[{ticker}] failed: {error}");
                    attempts.push(Attempt {
                        source: id,
                        ticker,
                        error,
                    });
                }
            }
        }

        let stale = self.cache.get(symbol).filter(|q| match self.opts.as_of {
            Some(as_of) => q.session.is_some_and(|session| session <= as_of),
            None => true,
        });
        if let Some(stale) = stale {
            warn!(
                "{symbol}: all live sources failed, serving cached quote from {}",
                stale.fetched_at.format("%Y-%m-%d %H:%M UTC")
            );
            let q = stale.into_cached();
            self.memo.insert(symbol.to_string(), q.clone());
            return Ok(q);
        }

        Err(ResolveError::AllSourcesExhausted {
            symbol: symbol.to_string(),
            attempts,
        })
    }

    /// Resolve `(symbol, name)` pairs in order. Failures don't stop the batch.
    pub fn resolve_batch(
        &mut self,
        items: &[(&str, &str)],
        progress: &dyn ResolveProgress,
    ) -> BatchSummary {
        let total = items.len();
        let mut summary = BatchSummary::default();

        for (i, (symbol, name)) in items.iter().enumerate() {
            progress.on_start(symbol, i, total);
            let result = self.resolve_named(symbol, name);
            progress.on_complete(symbol, i, total, &result);
            match result {
                Ok(q) => summary.quotes.push(q),
                Err(e) => summary.failures.push((symbol.to_string(), e)),
            }
        }

        progress.on_batch_complete(summary.quotes.len(), summary.failures.len(), total);
        summary
    }

    fn remember(&mut self, symbol: &str, quote: &Quote) {
        if self.should_store(symbol, quote) {
            // A failed flush only costs the next cold run this quote.
            if let Err(e) = self.cache.put(symbol, quote) {
                warn!("{symbol}: could not persist quote: {e}");
            }
        } else {
            debug!("{symbol}: keeping the newer cached session");
        }
        self.memo.insert(symbol.to_string(), quote.clone());
    }

    /// The cache holds the last known quote: an older session never replaces
    /// a newer one, and a dated run only writes over an entry it can show is
    /// not newer than its own quote.
    fn should_store(&self, symbol: &str, quote: &Quote) -> bool {
        let stored = self.cache.entry(symbol).map(|e| e.session);
        match (stored, quote.session) {
            (Some(Some(stored)), Some(session)) => session >= stored,
            _ if self.opts.as_of.is_some() => false,
            _ => true,
        }
    }
}

/// Call one source, honoring its limiter and the retry policy.
fn fetch_with_retry(
    source: &dyn QuoteSource,
    limiter: Option<&RateLimiter>,
    request: &QuoteRequest,
    opts: &ResolverOptions,
) -> Result<Quote, FetchError> {
    let mut retries_left = opts.retries;
    loop {
        if let Some(limiter) = limiter {
            match limiter.acquire(opts.max_wait) {
                Ok(waited) if !waited.is_zero() => {
                    debug!("{}: waited {:.1}s for rate limit", source.id(), waited.as_secs_f64());
                }
                Ok(_) => {}
                Err(required) => {
                    return Err(FetchError::RateLimited {
                        retry_after_secs: Some(required.as_secs()),
                    });
                }
            }
        }

        match source.fetch(request) {
            Ok(quote) => return Ok(quote),
            Err(FetchError::RateLimited { retry_after_secs }) => {
                if let Some(limiter) = limiter {
                    limiter.cool_down(retry_after_secs.map(Duration::from_secs));
                }
                return Err(FetchError::RateLimited { retry_after_secs });
            }
            Err(e) if e.is_retryable() && retries_left > 0 => {
                retries_left -= 1;
                debug!("{}[{}]: retrying after {e}", source.id(), request.ticker);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pin the caller's symbol and the answering source onto the quote.
fn normalize(mut quote: Quote, request: &QuoteRequest, id: SourceId) -> Quote {
    quote.symbol = request.symbol.clone();
    quote.source = if request.proxied {
        SourceTag::via_proxy(id, &request.ticker)
    } else {
        SourceTag::direct(id)
    };
    quote
}
