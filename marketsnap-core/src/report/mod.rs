//! Rendering snapshots and headlines for people and chat channels.
//!
//! - **Console**: monospace tables for a terminal
//! - **Markdown**: Obsidian notes with front matter and `[[backlinks]]`
//! - **Telegram**: compact digest lines
//! - **JSON**: the serde form of the data, pretty-printed

pub mod markdown;
pub mod text;

use crate::news::NewsItem;
use crate::snapshot::MarketSnapshot;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Markdown,
    Telegram,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Console,
        OutputFormat::Markdown,
        OutputFormat::Telegram,
        OutputFormat::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Console => "console",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Telegram => "telegram",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(OutputFormat::Console),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "telegram" | "tg" => Ok(OutputFormat::Telegram),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown format '{other}' (expected console, markdown, telegram or json)"
            )),
        }
    }
}

pub fn render_snapshot(
    snapshot: &MarketSnapshot,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Console => text::console_snapshot(snapshot),
        OutputFormat::Markdown => markdown::snapshot_note(snapshot),
        OutputFormat::Telegram => text::telegram_snapshot(snapshot),
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)?,
    })
}

/// `collected_at` is the local time stamped into headers.
pub fn render_news(
    items: &[NewsItem],
    format: OutputFormat,
    collected_at: NaiveDateTime,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Console => text::console_news(items, collected_at),
        OutputFormat::Markdown => markdown::news_note(items, collected_at),
        OutputFormat::Telegram => text::telegram_news(items, collected_at),
        OutputFormat::Json => serde_json::to_string_pretty(items)?,
    })
}

// ─── Number formatting ──────────────────────────────────────────────

/// `1234567.891` → `1,234,567.89`.
pub fn thousands(value: f64, decimals: usize) -> String {
    let raw = format!("{value:.decimals$}");
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut out = String::with_capacity(raw.len() + int.len() / 3);
    out.push_str(sign);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Thousands-separated with an explicit `+` on non-negative values.
pub fn signed_thousands(value: f64) -> String {
    let s = thousands(value, 2);
    if s.starts_with('-') {
        s
    } else {
        format!("+{s}")
    }
}

pub fn signed_pct(value: f64) -> String {
    format!("{value:+.2}%")
}

/// Single-line, at most `max` characters, `...` marking a cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let flat = text.trim().replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let keep = max.saturating_sub(3);
    let mut out: String = flat.chars().take(keep).collect();
    out.push_str("...");
    out
}
