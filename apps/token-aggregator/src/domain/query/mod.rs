//! Read-Path Query Operations
//!
//! Sorting and identity-cursor pagination applied to a snapshot before it
//! is returned to an HTTP caller.

mod pagination;
mod sort;

pub use pagination::{Page, paginate};
pub use sort::{SortField, SortOrder, sort};
