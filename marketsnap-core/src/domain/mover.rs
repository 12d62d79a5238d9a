//! Mover: a symbol ranked by percentage move for a session.

use super::quote::SourceTag;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Gainer,
    Loser,
}

impl Direction {
    /// Flat moves count as gainers.
    pub fn of(change_pct: f64) -> Self {
        if change_pct >= 0.0 {
            Direction::Gainer
        } else {
            Direction::Loser
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub name: String,
    pub change_pct: f64,
    pub direction: Direction,
    pub source: SourceTag,
}
