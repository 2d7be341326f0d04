//! Usage analytics.
//!
//! Turns a flat list of usage transactions into daily, weekly and hourly
//! trends, per-machine, per-line, per-roll and per-operator rollups, and the
//! dashboard counters. Everything here is a pure function of its input.

pub mod aggregator;
pub mod dashboard;
pub mod types;
pub mod utility;

pub use aggregator::UsageAggregator;
pub use dashboard::DashboardSnapshot;
