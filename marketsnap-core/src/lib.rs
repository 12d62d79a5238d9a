//! marketsnap core: best-effort daily market quotes from free data sources.
//!
//! This crate contains:
//! - Domain types (quotes, source tags, movers, markets)
//! - Source adapters for Stooq, Alpha Vantage and Yahoo Finance
//! - Per-source rate limiting and a persistent JSON quote cache
//! - The fallback resolver that walks source chains per symbol class
//! - Snapshot assembly, movers ranking, newsroom scraping and report rendering

pub mod config;
pub mod data;
pub mod domain;
pub mod movers;
pub mod news;
pub mod report;
pub mod snapshot;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: resolver state and its outputs can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Quote>();
        require_sync::<domain::Quote>();
        require_send::<domain::Mover>();
        require_sync::<domain::Mover>();
        require_send::<domain::SourceTag>();
        require_sync::<domain::SourceTag>();

        // Data layer
        require_send::<data::QuoteCache>();
        require_sync::<data::QuoteCache>();
        require_send::<data::RateLimiter>();
        require_sync::<data::RateLimiter>();
        require_send::<data::QuoteResolver>();
        require_sync::<data::QuoteResolver>();
        require_send::<data::ResolveError>();
        require_sync::<data::ResolveError>();

        // Outputs
        require_send::<snapshot::MarketSnapshot>();
        require_sync::<snapshot::MarketSnapshot>();
        require_send::<news::NewsItem>();
        require_sync::<news::NewsItem>();
    }

    /// Sources are only reachable through the trait object the resolver holds.
    #[test]
    fn quote_source_is_object_safe() {
        fn _check(source: &dyn data::QuoteSource, request: &data::QuoteRequest) {
            let _ = source.fetch(request);
        }
    }
}
