//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for upstream sources, cache store and broadcast sink.
pub mod ports;

/// Application services: aggregation, polling and the read path.
pub mod services;
