//! JSON quote cache.
//!
//! Layout: a single file holding `{ "<SYMBOL>": { name, price, change, percent,
//! source, proxy, timestamp, session } }`.
//!
//! - Loaded once when opened; every `put` flushes the whole map
//! - Atomic writes (write to .tmp, rename into place)
//! - A corrupt file is quarantined (`.corrupt`) and the cache starts empty
//! - No locking: at most one process is assumed to use the file

use crate::domain::{PriceMove, Quote, SourceId, SourceTag};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One cached quote as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub percent: f64,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<NaiveDate>,
}

impl CacheEntry {
    pub fn from_quote(quote: &Quote) -> Self {
        Self {
            name: quote.name.clone(),
            price: quote.close,
            change: quote.change,
            percent: quote.change_pct,
            source: quote.source.id,
            proxy: quote.source.proxy.clone(),
            timestamp: quote.fetched_at,
            session: quote.session,
        }
    }

    /// Rebuild the quote exactly as it was stored (original source tag kept).
    pub fn to_quote(&self, symbol: &str) -> Quote {
        let name = if self.name.is_empty() {
            symbol
        } else {
            self.name.as_str()
        };
        Quote::new(
            symbol,
            name,
            PriceMove {
                close: self.price,
                change: self.change,
                change_pct: self.percent,
                session: self.session,
            },
            SourceTag {
                id: self.source,
                proxy: self.proxy.clone(),
            },
            self.timestamp,
        )
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }
}

/// Symbol → last known quote, backed by one JSON file.
#[derive(Debug, Default)]
pub struct QuoteCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
}

impl QuoteCache {
    /// Load the cache file. A missing file yields an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    let quarantine = path.with_extension("json.corrupt");
                    warn!(
                        "quarantining corrupt quote cache {} -> {}: {e}",
                        path.display(),
                        quarantine.display()
                    );
                    let _ = fs::rename(&path, &quarantine);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        debug!("loaded {} cached quotes from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.entries.get(symbol).map(|e| e.to_quote(symbol))
    }

    pub fn entry(&self, symbol: &str) -> Option<&CacheEntry> {
        self.entries.get(symbol)
    }

    /// Store (overwrite) the quote for `symbol` and flush.
    pub fn put(&mut self, symbol: &str, quote: &Quote) -> Result<(), CacheError> {
        self.entries
            .insert(symbol.to_string(), CacheEntry::from_quote(quote));
        self.flush()
    }

    /// Age of the entry relative to now.
    pub fn age(&self, symbol: &str) -> Option<Duration> {
        self.age_at(symbol, Utc::now())
    }

    pub fn age_at(&self, symbol: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.entries.get(symbol).map(|e| e.age_at(now))
    }

    /// True when the entry exists and is younger than `window`.
    pub fn is_fresh(&self, symbol: &str, window: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(symbol, now).is_some_and(|age| age < window)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries older than `older_than` and flush. Returns the removed symbols.
    pub fn prune(
        &mut self,
        older_than: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, CacheError> {
        let removed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.age_at(now) >= older_than)
            .map(|(k, _)| k.clone())
            .collect();
        if removed.is_empty() {
            return Ok(removed);
        }
        for symbol in &removed {
            self.entries.remove(symbol);
        }
        self.flush()?;
        Ok(removed)
    }

    /// Write the whole map to disk (no-op for in-memory caches).
    pub fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|source| CacheError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            CacheError::Io {
                path: path.clone(),
                source,
            }
        })
    }
}
