//! Quote retrieval: sources, rate limiting, cache and the fallback resolver

pub mod alphavantage;
pub mod cache;
pub mod http;
pub mod provider;
pub mod rate_limit;
pub mod resolver;
pub mod stooq;
pub mod universe;
pub mod yahoo;

pub use alphavantage::AlphaVantageSource;
pub use cache::{CacheEntry, CacheError, QuoteCache};
pub use provider::{
    FetchError, ProxyTable, QuoteRequest, QuoteSource, Route, DAILY_QUOTA_RETRY_SECS,
};
pub use rate_limit::RateLimiter;
pub use resolver::{
    Attempt, BatchSummary, FallbackPlan, LogProgress, QuoteResolver, ResolveError,
    ResolveProgress, ResolverOptions,
};
pub use stooq::StooqSource;
pub use universe::{Constituent, Universe, UniverseError};
pub use yahoo::YahooSource;
