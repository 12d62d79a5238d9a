//! Daily market snapshot: index quotes per region plus movers per market.
//!
//! This is the data contract the report renderers consume. Resolution is
//! best-effort: an index that can't be resolved shows up as a row without a
//! quote and its symbol is listed in `failures`.

use crate::config::{AppConfig, IndexDef};
use crate::data::http;
use crate::data::resolver::{QuoteResolver, ResolveProgress};
use crate::data::universe::Universe;
use crate::domain::{Market, Quote};
use crate::movers::{rank_movers, RankedMovers, TOP_N};
use chrono::{DateTime, Local, NaiveDate, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONSTITUENTS_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do about movers for one market.
#[derive(Debug, Clone, PartialEq)]
pub enum MoversPlan {
    Scan(Universe),
    Skip { market: Market, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPlan {
    pub indices: Vec<IndexDef>,
    pub movers: Vec<MoversPlan>,
}

impl SnapshotPlan {
    pub fn from_config(config: &AppConfig, skip_movers: bool) -> Self {
        let dir = config.universes.constituents_dir.as_deref();
        let wiki = if config.universes.wikipedia_fallback && !skip_movers {
            match http::build_client(CONSTITUENTS_PAGE_TIMEOUT) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("constituents pages unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };
        let movers = Market::ALL
            .into_iter()
            .map(|market| {
                if skip_movers {
                    MoversPlan::Skip {
                        market,
                        reason: "skipped (--skip-movers)".into(),
                    }
                } else if config.universes.movers_markets.contains(&market) {
                    MoversPlan::Scan(
                        Universe::load(market, dir, wiki.as_ref())
                            .truncated(config.universes.max_members),
                    )
                } else {
                    MoversPlan::Skip {
                        market,
                        reason: "not covered by the configured sources".into(),
                    }
                }
            })
            .collect();

        Self {
            indices: config.indices.clone(),
            movers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub name: String,
    pub symbol: String,
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub market: Market,
    pub rows: Vec<IndexRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MoversOutcome {
    Ranked(RankedMovers),
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoversSection {
    pub market: Market,
    pub benchmark: String,
    pub outcome: MoversOutcome,
    /// Constituents resolved / attempted.
    pub resolved: usize,
    pub attempted: usize,
}

impl MoversSection {
    pub fn ranked(&self) -> Option<&RankedMovers> {
        match &self.outcome {
            MoversOutcome::Ranked(r) => Some(r),
            MoversOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Latest session seen in the data, else the as-of date, else today.
    pub report_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    pub regions: Vec<RegionSnapshot>,
    pub movers: Vec<MoversSection>,
    /// Symbols no source (or cache) could provide.
    pub failures: Vec<String>,
}

impl MarketSnapshot {
    /// Resolved index quotes in display order.
    pub fn index_quotes(&self) -> Vec<&Quote> {
        self.regions
            .iter()
            .flat_map(|r| r.rows.iter())
            .filter_map(|row| row.quote.as_ref())
            .collect()
    }

    pub fn region(&self, market: Market) -> Option<&RegionSnapshot> {
        self.regions.iter().find(|r| r.market == market)
    }

    pub fn movers_for(&self, market: Market) -> Option<&MoversSection> {
        self.movers.iter().find(|m| m.market == market)
    }
}

/// Resolve every index and scan every planned universe.
pub fn collect_snapshot(
    resolver: &mut QuoteResolver,
    plan: &SnapshotPlan,
    progress: &dyn ResolveProgress,
) -> MarketSnapshot {
    let as_of = resolver.options().as_of;
    let mut failures = Vec::new();

    info!("resolving {} index quotes", plan.indices.len());
    let items: Vec<(&str, &str)> = plan
        .indices
        .iter()
        .map(|d| (d.symbol.as_str(), d.name.as_str()))
        .collect();
    let summary = resolver.resolve_batch(&items, progress);
    failures.extend(summary.failed_symbols().into_iter().map(str::to_string));

    let mut regions: Vec<RegionSnapshot> = Vec::new();
    for def in &plan.indices {
        let quote = summary
            .quotes
            .iter()
            .find(|q| q.symbol == def.symbol)
            .cloned();
        let row = IndexRow {
            name: def.name.clone(),
            symbol: def.symbol.clone(),
            quote,
        };
        match regions.iter_mut().find(|r| r.market == def.market) {
            Some(region) => region.rows.push(row),
            None => regions.push(RegionSnapshot {
                market: def.market,
                rows: vec![row],
            }),
        }
    }
    regions.sort_by_key(|r| r.market);

    let mut movers = Vec::new();
    for entry in &plan.movers {
        let section = match entry {
            MoversPlan::Skip { market, reason } => MoversSection {
                market: *market,
                benchmark: market.benchmark().to_string(),
                outcome: MoversOutcome::Skipped {
                    reason: reason.clone(),
                },
                resolved: 0,
                attempted: 0,
            },
            MoversPlan::Scan(universe) => {
                info!(
                    "scanning {} {} constituents for movers; rate limits make this slow",
                    universe.len(),
                    universe.market.benchmark()
                );
                let batch = resolver.resolve_batch(&universe.pairs(), progress);
                failures.extend(batch.failed_symbols().into_iter().map(str::to_string));
                MoversSection {
                    market: universe.market,
                    benchmark: universe.market.benchmark().to_string(),
                    outcome: MoversOutcome::Ranked(rank_movers(&batch.quotes, TOP_N)),
                    resolved: batch.quotes.len(),
                    attempted: universe.len(),
                }
            }
        };
        movers.push(section);
    }

    let report_date = regions
        .iter()
        .flat_map(|r| r.rows.iter())
        .filter_map(|row| row.quote.as_ref().and_then(|q| q.session))
        .next()
        .or(as_of)
        .unwrap_or_else(|| Local::now().date_naive());

    MarketSnapshot {
        report_date,
        generated_at: Utc::now(),
        as_of,
        regions,
        movers,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_scans_us_only() {
        let plan = SnapshotPlan::from_config(&AppConfig::builtin(), false);
        assert_eq!(plan.indices.len(), 5);
        assert!(matches!(&plan.movers[0], MoversPlan::Scan(u) if u.market == Market::Us));
        assert!(matches!(
            &plan.movers[1],
            MoversPlan::Skip { market: Market::Cn, .. }
        ));
        assert!(matches!(
            &plan.movers[2],
            MoversPlan::Skip { market: Market::Hk, .. }
        ));
    }

    #[test]
    fn skip_movers_skips_every_market() {
        let plan = SnapshotPlan::from_config(&AppConfig::builtin(), true);
        assert!(plan
            .movers
            .iter()
            .all(|m| matches!(m, MoversPlan::Skip { reason, .. } if reason.contains("--skip-movers"))));
    }

    #[test]
    fn max_members_truncates_universe() {
        let mut config = AppConfig::builtin();
        config.universes.max_members = 3;
        let plan = SnapshotPlan::from_config(&config, false);
        match &plan.movers[0] {
            MoversPlan::Scan(u) => assert_eq!(u.len(), 3),
            other => panic!("expected scan, got {other:?}"),
        }
    }
}
