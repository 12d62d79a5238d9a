//! Integration tests for the on-disk quote cache.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use marketsnap_core::data::QuoteCache;
use marketsnap_core::domain::{PriceMove, Quote, SourceId, SourceTag};

const HAND_WRITTEN: &str = r#"{
  "^GSPC": {
    "name": "S&P 500",
    "price": 6819.57,
    "change": -63.21,
    "percent": -0.92,
    "source": "stooq",
    "timestamp": "2025-12-05T21:10:00Z",
    "session": "2025-12-05"
  },
  "^HSI": {
    "price": 21.3,
    "change": 0.085,
    "percent": 0.4,
    "source": "alphavantage",
    "proxy": "EWH",
    "timestamp": "2025-12-05T21:11:00Z"
  }
}"#;

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn reads_cache_files_written_by_other_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, HAND_WRITTEN).unwrap();

    let cache = QuoteCache::open(&path).unwrap();
    assert_eq!(cache.len(), 2);

    let gspc = cache.get("^GSPC").unwrap();
    assert_eq!(gspc.name, "S&P 500");
    assert_eq!(gspc.source, SourceTag::direct(SourceId::Stooq));
    assert_eq!(gspc.session, NaiveDate::from_ymd_opt(2025, 12, 5));

    // Entries without a name fall back to the symbol.
    let hsi = cache.get("^HSI").unwrap();
    assert_eq!(hsi.name, "^HSI");
    assert_eq!(hsi.source.to_string(), "alphavantage(EWH)");

    let now = ts("2025-12-06T21:10:00Z");
    assert!(cache.is_fresh("^GSPC", Duration::days(2), now));
    assert!(!cache.is_fresh("^GSPC", Duration::hours(12), now));
}

#[test]
fn flush_creates_parent_dirs_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/deeper/cache.json");
    let mut cache = QuoteCache::open(&path).unwrap();
    assert!(cache.is_empty());

    let quote = Quote::new(
        "AAPL",
        "Apple",
        PriceMove::new(278.8, 2.75, 1.0, None).unwrap(),
        SourceTag::direct(SourceId::AlphaVantage),
        Utc::now(),
    );
    cache.put("AAPL", &quote).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    assert_eq!(QuoteCache::open(&path).unwrap().get("AAPL"), Some(quote));
}

#[test]
fn corrupt_file_is_set_aside_and_cache_keeps_working() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    let mut cache = QuoteCache::open(&path).unwrap();
    assert!(cache.is_empty());
    assert!(path.with_extension("json.corrupt").exists());

    let quote = Quote::new(
        "MSFT",
        "Microsoft",
        PriceMove::new(483.2, -2.43, -0.5, None).unwrap(),
        SourceTag::direct(SourceId::YFinance),
        Utc::now(),
    );
    cache.put("MSFT", &quote).unwrap();
    assert_eq!(QuoteCache::open(&path).unwrap().len(), 1);
}

#[test]
fn prune_persists_removal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, HAND_WRITTEN).unwrap();

    let mut cache = QuoteCache::open(&path).unwrap();
    let removed = cache
        .prune(Duration::minutes(30), ts("2025-12-05T21:40:30Z"))
        .unwrap();
    assert_eq!(removed, vec!["^GSPC"]);

    let reopened = QuoteCache::open(&path).unwrap();
    assert!(reopened.get("^GSPC").is_none());
    assert!(reopened.get("^HSI").is_some());
}
