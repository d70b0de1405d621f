//! Analytics
//!
//! Event tracking storage lives in the repositories; this module owns the
//! daily aggregation and the monthly rollup.

pub mod aggregator;

pub use aggregator::Aggregator;
