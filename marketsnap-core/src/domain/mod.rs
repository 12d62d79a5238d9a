//! Domain types for marketsnap

pub mod market;
pub mod mover;
pub mod quote;

pub use market::Market;
pub use mover::{Direction, Mover};
pub use quote::{InvalidQuote, PriceMove, Quote, SourceId, SourceTag, SymbolClass};
