//! Aggregation Engine
//!
//! Reconciles per-source quote lists into one snapshot and turns two
//! consecutive snapshots into the update list pushed to subscribers.

mod diff;
mod merge;

pub use diff::diff;
pub use merge::merge;
