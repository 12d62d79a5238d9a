//! Obsidian-flavoured Markdown notes.
//!
//! Snapshot and news notes link to each other by title, so a daily vault
//! gets `Daily Market Snapshot - <date>` and `Global News - <date>` pages
//! with backlinks between them and to per-ticker pages.

use super::{signed_pct, signed_thousands, thousands};
use crate::domain::Mover;
use crate::news::NewsItem;
use crate::snapshot::MarketSnapshot;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

const BY_TICKER_LIMIT: usize = 10;
const TICKER_TITLE_CHARS: usize = 50;

pub fn snapshot_title(date: NaiveDate) -> String {
    format!("Daily Market Snapshot - {date}")
}

pub fn news_title(date: NaiveDate) -> String {
    format!("Global News - {date}")
}

fn front_matter(date: NaiveDate, kind: &str, tags: &str) -> Vec<String> {
    vec![
        "---".into(),
        format!("date: {date}"),
        format!("type: {kind}"),
        format!("tags: [{tags}]"),
        "---".into(),
        String::new(),
    ]
}

/// Page names can't carry `-` in tickers like `BRK-B`.
fn ticker_link(ticker: &str) -> String {
    format!("[[{}]]", ticker.replace('-', ""))
}

fn mover_bullets(lines: &mut Vec<String>, heading: &str, movers: &[Mover]) {
    if movers.is_empty() {
        return;
    }
    lines.push(format!("## {heading}"));
    lines.push(String::new());
    for m in movers {
        lines.push(format!(
            "- {} **{}** - {}",
            ticker_link(&m.symbol),
            signed_pct(m.change_pct),
            m.name
        ));
    }
    lines.push(String::new());
}

pub fn snapshot_note(snapshot: &MarketSnapshot) -> String {
    let today = snapshot.report_date;
    let yesterday = today - Duration::days(1);

    let mut lines = front_matter(today, "market-snapshot", "market, daily, indices");
    lines.push(format!("# {}", snapshot_title(today)));
    lines.push(String::new());

    for region in &snapshot.regions {
        lines.push(format!("## {} {}", region.market.flag(), region.market.title()));
        lines.push(String::new());
        lines.push("| Index | Close | Change | % | Source |".into());
        lines.push("|-------|------:|-------:|--:|--------|".into());
        for row in &region.rows {
            match &row.quote {
                Some(q) => lines.push(format!(
                    "| [[{}]] | {} | {} | {} | {} |",
                    row.name,
                    thousands(q.close, 2),
                    signed_thousands(q.change),
                    signed_pct(q.change_pct),
                    q.source
                )),
                None => lines.push(format!("| [[{}]] | - | - | - | - |", row.name)),
            }
        }
        lines.push(String::new());
    }

    for section in &snapshot.movers {
        let Some(ranked) = section.ranked() else {
            continue;
        };
        let code = section.market.code();
        mover_bullets(&mut lines, &format!("📈 {code} Top Gainers"), &ranked.gainers);
        mover_bullets(&mut lines, &format!("📉 {code} Top Losers"), &ranked.losers);
    }

    if !snapshot.failures.is_empty() {
        lines.push(format!("> Unavailable: {}", snapshot.failures.join(", ")));
        lines.push(String::new());
    }

    lines.push("---".into());
    lines.push(String::new());
    lines.push("## Related".into());
    lines.push(String::new());
    lines.push(format!("- [[{}|Yesterday]]", snapshot_title(yesterday)));
    lines.push(format!("- [[{}|Today's news]]", news_title(today)));

    lines.join("\n")
}

/// Strip the exchange suffix news cards use (`AMZN.US` → `AMZN`).
fn news_ticker_key(ticker: &str) -> String {
    ticker.replace(".US", "").replace(".HK", "")
}

pub fn news_note(items: &[NewsItem], collected_at: NaiveDateTime) -> String {
    let today = collected_at.date();
    if items.is_empty() {
        return "# Global News\n\nNo news found.".to_string();
    }

    let mut lines = front_matter(today, "news", "news, market, daily");
    lines.push(format!("# {}", news_title(today)));
    lines.push(String::new());
    lines.push(format!(
        "> Collected: {}  ",
        collected_at.format("%Y-%m-%d %H:%M")
    ));
    lines.push(format!("> {} items", items.len()));
    lines.push(String::new());
    lines.push("## Headlines".into());
    lines.push(String::new());

    // First-seen order per ticker.
    let mut by_ticker: Vec<(String, Vec<String>)> = Vec::new();
    let mut slot: BTreeMap<String, usize> = BTreeMap::new();

    for (i, item) in items.iter().enumerate() {
        let importance = item
            .importance
            .map(|imp| format!("{} {}", imp.emoji(), imp.label()))
            .unwrap_or_default();
        let sentiment = item.sentiment.map_or("", |s| s.emoji());

        lines.push(format!("### {}. {}", i + 1, item.title));
        lines.push(String::new());
        lines.push(format!("- **Source**: {} · {}", item.source, item.time));
        lines.push(format!("- **Importance**: {importance} {sentiment}").trim_end().to_string());
        if !item.tickers.is_empty() {
            let links: Vec<String> = item
                .tickers
                .iter()
                .map(|t| format!("[[{}]]", news_ticker_key(t)))
                .collect();
            lines.push(format!("- **Tickers**: {}", links.join(" ")));
        }
        lines.push(String::new());
        if !item.summary.is_empty() {
            lines.push(format!("> {}", item.summary));
            lines.push(String::new());
        }

        for t in &item.tickers {
            let key = news_ticker_key(t);
            let idx = *slot.entry(key.clone()).or_insert_with(|| {
                by_ticker.push((key, Vec::new()));
                by_ticker.len() - 1
            });
            let title: String = item.title.chars().take(TICKER_TITLE_CHARS).collect();
            by_ticker[idx].1.push(title);
        }
    }

    lines.push("---".into());
    lines.push(String::new());
    lines.push("## Related".into());
    lines.push(String::new());
    lines.push(format!("- [[{}|Yesterday's news]]", news_title(today - Duration::days(1))));
    lines.push(format!("- [[{}|Today's snapshot]]", snapshot_title(today)));

    if !by_ticker.is_empty() {
        lines.push(String::new());
        lines.push("### By Ticker".into());
        for (ticker, titles) in by_ticker.iter().take(BY_TICKER_LIMIT) {
            lines.push(format!("- [[{ticker}]]: {} items", titles.len()));
        }
    }

    lines.join("\n")
}
