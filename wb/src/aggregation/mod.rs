//! Merging per-window responses into one answer
//!
//! Each workspace command is registered with an [`AggregationStrategy`]; the
//! coordinator looks the strategy up in a [`StrategyTable`] when it opens a
//! broadcast and applies it once the broadcast completes.

mod strategy;
mod table;

pub use strategy::AggregationStrategy;
pub use table::StrategyTable;
