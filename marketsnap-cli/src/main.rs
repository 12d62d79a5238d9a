//! marketsnap CLI: daily snapshot, newsroom and cache management commands.
//!
//! Commands:
//! - `snapshot`: resolve index quotes and movers through the fallback chains
//! - `news`: scrape newsroom headlines
//! - `cache status`: list cached quotes with their age
//! - `cache prune`: remove quotes older than a given number of days

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use marketsnap_core::config::AppConfig;
use marketsnap_core::data::{LogProgress, QuoteCache, QuoteResolver, ResolverOptions};
use marketsnap_core::news::{NewsClient, NewsOptions};
use marketsnap_core::report::{render_news, render_snapshot, truncate_chars, OutputFormat};
use marketsnap_core::snapshot::{collect_snapshot, SnapshotPlan};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "marketsnap",
    about = "Best-effort daily market snapshot from free data sources"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve index quotes and top movers, then print a report.
    Snapshot {
        /// Report as of this date (YYYY-MM-DD). Defaults to the latest session.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Skip the movers scan (it takes minutes under free-tier rate limits).
        #[arg(long, default_value_t = false)]
        skip_movers: bool,

        /// Serve fresh cached quotes without touching the network.
        #[arg(long, default_value_t = false)]
        fast: bool,

        /// Printed format: console, markdown, telegram or json.
        #[arg(long, default_value = "console")]
        format: OutputFormat,

        /// Also write an Obsidian note to this path.
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Also write the snapshot as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Quote cache file. Overrides the config.
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },
    /// Scrape newsroom headlines.
    News {
        /// Maximum number of headlines.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only HIGH importance headlines.
        #[arg(long, default_value_t = false)]
        important: bool,

        /// Printed format: console, markdown, telegram or json.
        #[arg(long, default_value = "console")]
        format: OutputFormat,

        /// Also write the headlines as JSON to this path.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Also write an Obsidian note to this path.
        #[arg(long, short = 'm')]
        markdown: Option<PathBuf>,
    },
    /// Quote cache management commands.
    Cache {
        /// Quote cache file. Overrides the config.
        #[arg(long, global = true)]
        cache_file: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached quotes with their age and freshness.
    Status,
    /// Remove quotes older than the given number of days.
    Prune {
        #[arg(long)]
        older_than_days: u32,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Snapshot {
            date,
            skip_movers,
            fast,
            format,
            markdown,
            json,
            cache_file,
        } => run_snapshot(
            &config,
            SnapshotArgs {
                date,
                skip_movers,
                fast,
                format,
                markdown,
                json,
                cache_file,
            },
        ),
        Commands::News {
            limit,
            important,
            format,
            output,
            markdown,
        } => run_news(&config, limit, important, format, output, markdown),
        Commands::Cache { cache_file, action } => {
            let path = cache_file.unwrap_or_else(|| config.cache.resolved_path());
            match action {
                CacheAction::Status => run_cache_status(&config, &path),
                CacheAction::Prune {
                    older_than_days,
                    confirm,
                } => run_cache_prune(&path, older_than_days, confirm),
            }
        }
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AppConfig::builtin()),
    }
}

/// Write `content` to `path`, creating parent directories.
fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

struct SnapshotArgs {
    date: Option<NaiveDate>,
    skip_movers: bool,
    fast: bool,
    format: OutputFormat,
    markdown: Option<PathBuf>,
    json: Option<PathBuf>,
    cache_file: Option<PathBuf>,
}

fn run_snapshot(config: &AppConfig, args: SnapshotArgs) -> Result<()> {
    let cache_path = args
        .cache_file
        .unwrap_or_else(|| config.cache.resolved_path());
    let cache = QuoteCache::open(&cache_path)?;

    let mut opts = ResolverOptions::from_config(config);
    opts.fast |= args.fast;
    opts.as_of = args.date;

    let mut resolver = QuoteResolver::from_config(config, cache, opts)?;
    let plan = SnapshotPlan::from_config(config, args.skip_movers);
    let snapshot = collect_snapshot(&mut resolver, &plan, &LogProgress);

    if let Some(path) = &args.markdown {
        write_output(path, &render_snapshot(&snapshot, OutputFormat::Markdown)?)?;
        println!("Markdown note saved to {}", path.display());
    }
    if let Some(path) = &args.json {
        write_output(path, &render_snapshot(&snapshot, OutputFormat::Json)?)?;
        println!("JSON snapshot saved to {}", path.display());
    }

    println!();
    println!("{}", render_snapshot(&snapshot, args.format)?);

    if snapshot.index_quotes().is_empty() && !plan.indices.is_empty() {
        bail!("no index quote could be resolved from any source or the cache");
    }
    Ok(())
}

fn run_news(
    config: &AppConfig,
    limit: usize,
    important: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
    markdown: Option<PathBuf>,
) -> Result<()> {
    let client = NewsClient::new(&config.news)?;
    let items = client.fetch(NewsOptions {
        limit,
        important_only: important,
    })?;
    let collected_at = Local::now().naive_local();

    if let Some(path) = &output {
        write_output(path, &render_news(&items, OutputFormat::Json, collected_at)?)?;
        println!("Headlines saved to {}", path.display());
    }
    if let Some(path) = &markdown {
        write_output(path, &render_news(&items, OutputFormat::Markdown, collected_at)?)?;
        println!("Markdown note saved to {}", path.display());
    }

    println!();
    println!("{}", render_news(&items, format, collected_at)?);
    Ok(())
}

fn run_cache_status(config: &AppConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        println!("Cache file does not exist: {}", path.display());
        return Ok(());
    }
    let cache = QuoteCache::open(path)?;
    if cache.is_empty() {
        println!("Cache is empty: {}", path.display());
        return Ok(());
    }

    let now = Utc::now();
    let window = config.cache.fresh_window();
    println!("Cache: {}", path.display());
    println!("Quotes: {}", cache.len());
    println!();
    println!(
        "{:<12} {:<24} {:>12} {:>8} {:<18} {:>8} {:<5}",
        "Symbol", "Name", "Price", "Change%", "Source", "Age", "Fresh"
    );
    println!("{}", "-".repeat(95));
    for (symbol, entry) in cache.entries() {
        let source = match &entry.proxy {
            Some(proxy) => format!("{}({proxy})", entry.source),
            None => entry.source.to_string(),
        };
        let age = entry.age_at(now);
        println!(
            "{:<12} {:<24} {:>12.2} {:>+7.2}% {:<18} {:>8} {:<5}",
            symbol,
            truncate_chars(&entry.name, 24),
            entry.price,
            entry.percent,
            source,
            format_age(age),
            if age < window { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn run_cache_prune(path: &Path, older_than_days: u32, confirm: bool) -> Result<()> {
    if !path.exists() {
        println!("Cache file does not exist: {}", path.display());
        return Ok(());
    }
    let mut cache = QuoteCache::open(path)?;
    let now = Utc::now();
    let older_than = chrono::Duration::days(i64::from(older_than_days));

    let stale: Vec<&str> = cache
        .entries()
        .filter(|(_, e)| e.age_at(now) >= older_than)
        .map(|(symbol, _)| symbol)
        .collect();
    if stale.is_empty() {
        println!("No quotes older than {older_than_days} days to remove.");
        return Ok(());
    }

    println!(
        "Found {} quote(s) older than {older_than_days} days:",
        stale.len()
    );
    for symbol in &stale {
        println!("  {symbol}");
    }

    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = cache.prune(older_than, now)?;
    println!("Done. Removed {} quote(s).", removed.len());
    Ok(())
}

fn format_age(age: chrono::Duration) -> String {
    if age.num_days() >= 1 {
        format!("{}d", age.num_days())
    } else if age.num_hours() >= 1 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}
