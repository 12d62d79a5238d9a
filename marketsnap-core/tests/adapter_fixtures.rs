//! Adapter parsers and the newsroom scraper against captured payloads.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use marketsnap_core::data::alphavantage::{parse_daily_series, parse_global_quote};
use marketsnap_core::data::stooq::parse_daily_csv;
use marketsnap_core::data::yahoo::parse_chart;
use marketsnap_core::data::{FetchError, Universe, DAILY_QUOTA_RETRY_SECS};
use marketsnap_core::domain::Market;
use marketsnap_core::news::{parse_newsroom, Importance, NewsOptions, Sentiment};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_dir().join(name)).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ── Stooq ──────────────────────────────────────────────────────────────

#[test]
fn stooq_latest_session() {
    let mv = parse_daily_csv("^spx", &fixture("stooq_spx.csv"), None).unwrap();
    assert_eq!(mv.close, 6819.57);
    assert!(approx(mv.change, -63.21));
    assert_eq!(format!("{:.2}", mv.change_pct), "-0.92");
    assert_eq!(mv.session, Some(date(2025, 12, 5)));
}

#[test]
fn stooq_as_of_uses_sessions_up_to_that_date() {
    let mv = parse_daily_csv("^spx", &fixture("stooq_spx.csv"), Some(date(2025, 12, 3))).unwrap();
    assert_eq!(mv.close, 6880.30);
    assert!(approx(mv.change, 6880.30 - 6866.48));
    assert_eq!(mv.session, Some(date(2025, 12, 3)));
}

// ── Alpha Vantage ──────────────────────────────────────────────────────

#[test]
fn alpha_vantage_global_quote_for_proxy() {
    let mv = parse_global_quote("EWH", &fixture("av_global_quote_ewh.json")).unwrap();
    assert_eq!(mv.close, 21.30);
    assert!(approx(mv.change, 0.085));
    assert_eq!(format!("{:+.2}", mv.change_pct), "+0.40");
    assert_eq!(mv.session, Some(date(2025, 12, 5)));
}

#[test]
fn alpha_vantage_daily_series_as_of() {
    let body = fixture("av_daily_qqq.json");
    let latest = parse_daily_series("QQQ", &body, None).unwrap();
    assert_eq!(latest.close, 608.20);
    assert!(latest.change < 0.0 && latest.change_pct < 0.0);

    let earlier = parse_daily_series("QQQ", &body, Some(date(2025, 12, 4))).unwrap();
    assert_eq!(earlier.close, 612.80);
    assert_eq!(earlier.session, Some(date(2025, 12, 4)));
}

#[test]
fn alpha_vantage_daily_quota_payload_blocks_for_the_day() {
    let body = fixture("av_throttled.json");
    let daily = FetchError::RateLimited {
        retry_after_secs: Some(DAILY_QUOTA_RETRY_SECS),
    };
    assert_eq!(parse_global_quote("AAPL", &body).unwrap_err(), daily);
    assert_eq!(parse_daily_series("AAPL", &body, None).unwrap_err(), daily);
}

// ── Yahoo ──────────────────────────────────────────────────────────────

#[test]
fn yahoo_chart_for_index() {
    let mv = parse_chart("^HSI", &fixture("yahoo_hsi.json"), None).unwrap();
    assert_eq!(mv.close, 26085.08);
    assert!(approx(mv.change, 26085.08 - 25980.10));
    assert_eq!(mv.session, Some(date(2025, 12, 5)));
}

// ── Newsroom ───────────────────────────────────────────────────────────

#[test]
fn newsroom_page_parses_titled_cards() {
    let items = parse_newsroom(&fixture("newsroom.html"), NewsOptions::default()).unwrap();
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Fed signals pause as inflation cools",
            "Tencent lifts buyback plan",
            "Chipmakers slide on export curbs",
        ]
    );

    let first = &items[0];
    assert_eq!(first.source, "Reuters");
    assert_eq!(first.time, "2시간 전");
    assert_eq!(first.importance, Some(Importance::High));
    assert_eq!(first.sentiment, Some(Sentiment::Positive));
    assert_eq!(first.tickers, vec!["AMZN.US"]);

    assert_eq!(items[1].sentiment, Some(Sentiment::Neutral));
    assert_eq!(items[2].tickers, vec!["NVDA.US", "AMD.US"]);
}

#[test]
fn newsroom_important_only_with_limit() {
    let opts = NewsOptions {
        limit: 1,
        important_only: true,
    };
    let items = parse_newsroom(&fixture("newsroom.html"), opts).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Fed signals pause as inflation cools");
}

// ── Universes ──────────────────────────────────────────────────────────

#[test]
fn constituents_csv_overrides_builtin_list() {
    let dir: &Path = &fixture_dir();
    let universe = Universe::load(Market::Us, Some(dir), None);
    assert_eq!(
        universe.pairs(),
        vec![
            ("AAPL", "Apple Inc."),
            ("NVDA", "NVIDIA Corporation"),
            ("MSFT", "Microsoft Corporation"),
            ("TSLA", "Tesla Inc."),
        ]
    );
    // No HK file in the fixtures: built-in list.
    assert_eq!(Universe::load(Market::Hk, Some(dir), None), Universe::builtin(Market::Hk));
}
