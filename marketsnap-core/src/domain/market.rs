//! Market regions covered by the snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Us,
    Cn,
    Hk,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Us, Market::Cn, Market::Hk];

    pub fn code(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Cn => "CN",
            Market::Hk => "HK",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Market::Us => "United States",
            Market::Cn => "China",
            Market::Hk => "Hong Kong",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Market::Us => "🇺🇸",
            Market::Cn => "🇨🇳",
            Market::Hk => "🇭🇰",
        }
    }

    /// Benchmark whose constituents form the movers universe.
    pub fn benchmark(&self) -> &'static str {
        match self {
            Market::Us => "NDX",
            Market::Cn => "CSI 300",
            Market::Hk => "HSI",
        }
    }

    /// Stem of the constituents CSV file, e.g. `us_ndx`.
    pub fn constituents_stem(&self) -> &'static str {
        match self {
            Market::Us => "us_ndx",
            Market::Cn => "cn_csi300",
            Market::Hk => "hk_hsi",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
