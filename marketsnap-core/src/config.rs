//! Serializable application configuration.
//!
//! Everything the fetch layer needs is injected from here: source endpoints,
//! rate limits, fallback chains, the index → ETF proxy table and the Stooq
//! symbol table. All sections are optional in the TOML file; missing keys fall
//! back to the defaults below.

use crate::data::provider::ProxyTable;
use crate::domain::{Market, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the Alpha Vantage key.
pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

/// Used when neither the environment nor the config file provides a key.
/// This is Alpha Vantage's public demo key; it only answers a handful of symbols.
pub const DEFAULT_ALPHA_VANTAGE_KEY: &str = "demo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub sources: SourcesConfig,
    pub universes: UniverseConfig,
    pub indices: Vec<IndexDef>,
    pub news: NewsConfig,
}

impl AppConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(content)?;
        if config.indices.is_empty() {
            config.indices = IndexDef::defaults();
        }
        config.validate()?;
        Ok(config)
    }

    /// The built-in configuration (what you get with no config file).
    pub fn builtin() -> Self {
        Self {
            indices: IndexDef::defaults(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.fresh_days <= 0 {
            return Err(ConfigError::Invalid("cache.fresh_days must be positive".into()));
        }
        for (label, chain) in [
            ("fetch.index_chain", &self.fetch.index_chain),
            ("fetch.equity_chain", &self.fetch.equity_chain),
        ] {
            if chain.is_empty() {
                return Err(ConfigError::Invalid(format!("{label} is empty")));
            }
            if chain.contains(&SourceId::Cache) {
                return Err(ConfigError::Invalid(format!(
                    "{label} must not list 'cache'; the cache is always the last resort"
                )));
            }
        }
        for (id, limit) in [
            (SourceId::Stooq, &self.sources.stooq.rate_limit),
            (SourceId::AlphaVantage, &self.sources.alphavantage.rate_limit),
            (SourceId::YFinance, &self.sources.yfinance.rate_limit),
        ] {
            if let Some(limit) = limit {
                if limit.max_calls == 0 || limit.per_secs == 0 || limit.burst == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "sources.{id}.rate_limit values must be positive"
                    )));
                }
            }
        }
        if self.universes.max_members == 0 {
            return Err(ConfigError::Invalid("universes.max_members must be positive".into()));
        }
        Ok(())
    }
}

/// Quote cache location and freshness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file. Defaults to `<user cache dir>/marketsnap/cache.json`.
    pub path: Option<PathBuf>,
    /// Entries younger than this are "fresh".
    pub fresh_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            fresh_days: 2,
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_cache_path)
    }

    pub fn fresh_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.fresh_days)
    }
}

/// Per-user cache file location.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marketsnap")
        .join("cache.json")
}

/// Fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Serve fresh cache entries without touching the network.
    pub fast: bool,
    /// Longest a single rate-limit wait may block before the source is skipped.
    pub max_wait_secs: u64,
    /// Extra attempts per source for network/parse failures.
    pub retries: u32,
    pub index_chain: Vec<SourceId>,
    pub equity_chain: Vec<SourceId>,
    /// Index symbol → ETF ticker, for sources that can't quote the index.
    pub proxies: ProxyTable,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let proxies = [
            ("^GSPC", "SPY"),
            ("^NDX", "QQQ"),
            ("^HSI", "EWH"),
            ("000001.SS", "ASHR"),
            ("000300.SS", "ASHR"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            fast: false,
            max_wait_secs: 90,
            retries: 1,
            index_chain: vec![SourceId::Stooq, SourceId::AlphaVantage, SourceId::YFinance],
            equity_chain: vec![SourceId::AlphaVantage, SourceId::YFinance],
            proxies,
        }
    }
}

impl FetchConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Client-side token bucket settings for one source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Sustained calls allowed per `per_secs`.
    pub max_calls: u32,
    pub per_secs: u64,
    /// Calls that may go out back-to-back before spacing kicks in.
    pub burst: u32,
    /// Pause imposed on the source after it reports a rate limit.
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    pub stooq: StooqSettings,
    pub alphavantage: AlphaVantageSettings,
    pub yfinance: YahooSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StooqSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub rate_limit: Option<RateLimitSettings>,
    /// Symbol → Stooq ticker. Indices missing here are unsupported by Stooq.
    pub symbols: BTreeMap<String, String>,
}

impl Default for StooqSettings {
    fn default() -> Self {
        let symbols = [
            ("^GSPC", "^spx"),
            ("^NDX", "^ndx"),
            ("^HSI", "^hsi"),
            ("000001.SS", "000001.ss"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            base_url: "https://stooq.com".into(),
            timeout_secs: 30,
            rate_limit: Some(RateLimitSettings {
                max_calls: 30,
                per_secs: 60,
                burst: 5,
                cooldown_secs: 3600,
            }),
            symbols,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlphaVantageSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub rate_limit: Option<RateLimitSettings>,
    /// Overridden by `ALPHA_VANTAGE_API_KEY` when that is set.
    pub api_key: Option<String>,
}

impl Default for AlphaVantageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co".into(),
            timeout_secs: 30,
            // Free tier: 5 calls/minute. Burst 1 spaces calls 12s apart.
            rate_limit: Some(RateLimitSettings {
                max_calls: 5,
                per_secs: 60,
                burst: 1,
                cooldown_secs: 60,
            }),
            api_key: None,
        }
    }
}

impl AlphaVantageSettings {
    /// Environment first, then the config file, then the demo key.
    pub fn resolved_api_key(&self) -> String {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }
}

fn resolve_api_key(env_value: Option<String>, configured: Option<&str>) -> String {
    env_value
        .filter(|k| !k.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ALPHA_VANTAGE_KEY.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YahooSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub rate_limit: Option<RateLimitSettings>,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".into(),
            timeout_secs: 30,
            rate_limit: Some(RateLimitSettings {
                max_calls: 30,
                per_secs: 60,
                burst: 2,
                cooldown_secs: 120,
            }),
        }
    }
}

/// Movers universes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UniverseConfig {
    /// Directory with `us_ndx.csv`, `cn_csi300.csv`, `hk_hsi.csv`.
    pub constituents_dir: Option<PathBuf>,
    /// Scan at most this many constituents per market.
    pub max_members: usize,
    /// Markets whose movers are scanned. Others are reported as skipped.
    pub movers_markets: Vec<Market>,
    /// Scrape the index's Wikipedia constituents table when no CSV is present.
    pub wikipedia_fallback: bool,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            constituents_dir: None,
            max_members: 25,
            movers_markets: vec![Market::Us],
            wikipedia_fallback: false,
        }
    }
}

/// One index row of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexDef {
    pub market: Market,
    pub name: String,
    pub symbol: String,
}

impl IndexDef {
    pub fn new(market: Market, name: &str, symbol: &str) -> Self {
        Self {
            market,
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn defaults() -> Vec<IndexDef> {
        vec![
            IndexDef::new(Market::Us, "S&P 500", "^GSPC"),
            IndexDef::new(Market::Us, "NASDAQ 100", "^NDX"),
            IndexDef::new(Market::Cn, "SSE", "000001.SS"),
            IndexDef::new(Market::Cn, "CSI 300", "000300.SS"),
            IndexDef::new(Market::Hk, "Hang Seng", "^HSI"),
        ]
    }
}

/// Newsroom scraping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            url: "https://blackquant.kr/newsroom".into(),
            timeout_secs: 30,
        }
    }
}
