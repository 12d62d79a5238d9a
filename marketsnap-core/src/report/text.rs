//! Plain-text renderers: console tables and Telegram digests.

use super::{signed_pct, signed_thousands, thousands, truncate_chars};
use crate::domain::{Mover, SourceId};
use crate::news::{Importance, NewsItem};
use crate::snapshot::{IndexRow, MarketSnapshot, MoversOutcome};
use chrono::NaiveDateTime;

const MISSING: &str = "n/a";
const NAME_WIDTH: usize = 30;
const TELEGRAM_MOVERS: usize = 5;

// ─── Snapshot: console ──────────────────────────────────────────────

fn index_header() -> String {
    format!(
        "{:<18} | {:>12} | {:>10} | {:>9} | source",
        "index", "close", "change", "change%"
    )
}

fn index_line(row: &IndexRow) -> String {
    match &row.quote {
        Some(q) => format!(
            "{:<18} | {:>12} | {:>10} | {:>9} | {}",
            row.name,
            thousands(q.close, 2),
            signed_thousands(q.change),
            signed_pct(q.change_pct),
            q.source
        ),
        None => format!(
            "{:<18} | {MISSING:>12} | {MISSING:>10} | {MISSING:>9} | -",
            row.name
        ),
    }
}

fn movers_table(title: &str, movers: &[Mover]) -> String {
    if movers.is_empty() {
        return format!("{title}\n- (no data)");
    }
    let mut lines = vec![
        title.to_string(),
        format!("{:<10} | {:<NAME_WIDTH$} | {:>8} | source", "ticker", "name", "move%"),
        "-".repeat(72),
    ];
    for m in movers {
        lines.push(format!(
            "{:<10} | {:<NAME_WIDTH$} | {:>8} | {}",
            m.symbol,
            truncate_chars(&m.name, NAME_WIDTH),
            signed_pct(m.change_pct),
            m.source
        ));
    }
    lines.join("\n")
}

/// Full console report: per-region index tables, movers tables, notes.
pub fn console_snapshot(snapshot: &MarketSnapshot) -> String {
    let mut blocks = vec![
        "📌 Daily Market Snapshot".to_string(),
        format!("Report date (latest session): {}", snapshot.report_date),
    ];

    for region in &snapshot.regions {
        let header = index_header();
        let mut lines = vec![
            format!("{} {}", region.market.flag(), region.market.title()),
            header.clone(),
            "-".repeat(header.chars().count()),
        ];
        lines.extend(region.rows.iter().map(index_line));
        blocks.push(lines.join("\n"));
    }

    for section in &snapshot.movers {
        let code = section.market.code();
        match &section.outcome {
            MoversOutcome::Ranked(ranked) => {
                let gainers_title = format!(
                    "📈 {code} gainers ({}, {}/{} resolved)",
                    section.benchmark, section.resolved, section.attempted
                );
                let losers_title = format!("📉 {code} losers ({})", section.benchmark);
                blocks.push(movers_table(&gainers_title, &ranked.gainers));
                blocks.push(movers_table(&losers_title, &ranked.losers));
            }
            MoversOutcome::Skipped { reason } => {
                blocks.push(format!("{code} movers: {reason}"));
            }
        }
    }

    let mut notes = vec!["Notes:".to_string()];
    let cached: Vec<&str> = snapshot
        .index_quotes()
        .into_iter()
        .filter(|q| q.source.id == SourceId::Cache)
        .map(|q| q.symbol.as_str())
        .collect();
    if !cached.is_empty() {
        notes.push(format!("- served from cache: {}", cached.join(", ")));
    }
    if !snapshot.failures.is_empty() {
        notes.push(format!("- failed tickers: {}", snapshot.failures.join(", ")));
    }
    if notes.len() == 1 {
        notes.push("- all symbols resolved from live sources".to_string());
    }
    blocks.push(notes.join("\n"));

    blocks.join("\n\n")
}

// ─── Snapshot: Telegram ─────────────────────────────────────────────

fn briefs(movers: &[Mover]) -> String {
    movers
        .iter()
        .take(TELEGRAM_MOVERS)
        .map(|m| format!("{} {}", m.symbol, signed_pct(m.change_pct)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn telegram_snapshot(snapshot: &MarketSnapshot) -> String {
    let mut lines = vec![
        format!("📌 Market snapshot {}", snapshot.report_date),
        String::new(),
    ];

    for region in &snapshot.regions {
        for row in &region.rows {
            let value = match &row.quote {
                Some(q) => format!(
                    "{} ({})",
                    thousands(q.close, 2),
                    signed_pct(q.change_pct)
                ),
                None => MISSING.to_string(),
            };
            lines.push(format!("{} {}: {value}", region.market.flag(), row.name));
        }
    }

    for section in &snapshot.movers {
        let Some(ranked) = section.ranked() else {
            continue;
        };
        let code = section.market.code();
        if !ranked.gainers.is_empty() {
            lines.push(format!("📈 {code}: {}", briefs(&ranked.gainers)));
        }
        if !ranked.losers.is_empty() {
            lines.push(format!("📉 {code}: {}", briefs(&ranked.losers)));
        }
    }

    if !snapshot.failures.is_empty() {
        lines.push(format!("⚠️ failed: {}", snapshot.failures.join(", ")));
    }
    lines.join("\n")
}

// ─── News ───────────────────────────────────────────────────────────

const SUMMARY_CHARS: usize = 150;
const TELEGRAM_TITLE_CHARS: usize = 60;

pub fn console_news(items: &[NewsItem], collected_at: NaiveDateTime) -> String {
    if items.is_empty() {
        return "No headlines found.".to_string();
    }

    let mut lines = vec![
        "📰 Global news digest".to_string(),
        format!("Collected: {}", collected_at.format("%Y-%m-%d %H:%M")),
        format!("{} items", items.len()),
        String::new(),
        "=".repeat(70),
        String::new(),
    ];

    for (i, item) in items.iter().enumerate() {
        let imp = item.importance.map_or("⚪", |imp| imp.emoji());
        let sent = item.sentiment.map_or("", |s| s.emoji());
        lines.push(format!("[{}] {imp} {}", i + 1, item.title));
        let meta = format!("    📍 {} · {} {sent}", item.source, item.time);
        lines.push(meta.trim_end().to_string());
        if !item.summary.is_empty() {
            let summary = if item.summary.chars().count() > SUMMARY_CHARS {
                let head: String = item.summary.chars().take(SUMMARY_CHARS).collect();
                format!("{head}...")
            } else {
                item.summary.clone()
            };
            lines.push(format!("    📝 {summary}"));
        }
        if !item.tickers.is_empty() {
            lines.push(format!("    🏷️ {}", item.tickers.join(", ")));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn telegram_news(items: &[NewsItem], collected_at: NaiveDateTime) -> String {
    if items.is_empty() {
        return "No news".to_string();
    }

    let mut lines = vec![
        format!("📰 Global news ({})", collected_at.format("%H:%M")),
        String::new(),
    ];
    for item in items {
        let imp = match item.importance {
            Some(Importance::Low) | None => "",
            Some(imp) => imp.emoji(),
        };
        let sent = item.sentiment.map_or("", |s| s.arrow());
        let title: String = item.title.chars().take(TELEGRAM_TITLE_CHARS).collect();
        let ticker = item
            .tickers
            .first()
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();
        lines.push(format!("{imp}{sent} {title}{ticker}"));
    }
    lines.join("\n")
}
