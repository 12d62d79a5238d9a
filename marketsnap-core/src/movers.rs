//! Top gainers/losers ranking.

use crate::domain::{Direction, Mover, Quote};
use serde::{Deserialize, Serialize};

/// Movers kept per direction.
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedMovers {
    pub gainers: Vec<Mover>,
    pub losers: Vec<Mover>,
}

impl RankedMovers {
    pub fn is_empty(&self) -> bool {
        self.gainers.is_empty() && self.losers.is_empty()
    }
}

/// Split quotes into gainers (`>= 0%`, biggest first) and losers (`< 0%`,
/// biggest drop first), keeping `limit` of each.
pub fn rank_movers(quotes: &[Quote], limit: usize) -> RankedMovers {
    let mut gainers = Vec::new();
    let mut losers = Vec::new();

    for q in quotes {
        let mover = Mover {
            symbol: q.symbol.clone(),
            name: q.name.clone(),
            change_pct: q.change_pct,
            direction: Direction::of(q.change_pct),
            source: q.source.clone(),
        };
        match mover.direction {
            Direction::Gainer => gainers.push(mover),
            Direction::Loser => losers.push(mover),
        }
    }

    gainers.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
    losers.sort_by(|a, b| a.change_pct.total_cmp(&b.change_pct));
    gainers.truncate(limit);
    losers.truncate(limit);

    RankedMovers { gainers, losers }
}
