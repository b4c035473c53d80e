//! Derived views over normalized trend data.

pub mod aggregator;

pub use aggregator::*;
