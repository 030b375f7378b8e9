//! Domain Layer - Quote types and the reconciliation engine.
//!
//! This layer contains the core quote types and every synchronous
//! algorithm of the service. Nothing here performs I/O or suspends.

/// Quote records, update projections and token identity.
pub mod quote;

/// Cross-source merge and snapshot diffing.
pub mod aggregation;

/// Sorting and cursor pagination for the read path.
pub mod query;
