use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::aggregate::aggregator::UsageAggregator;
use crate::model::{RollSpec, UsageRecord};

/// How many rows the "recent usage" table shows.
pub const RECENT_LIMIT: usize = 10;

/// Headline counters for the operator dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub total_rolls: usize,
    pub todays_transactions: usize,
    pub total_transactions: usize,
    pub recent: Vec<UsageRecord>,
}

impl DashboardSnapshot {
    pub fn build<Tz: TimeZone>(
        rolls: &[RollSpec],
        usage: &UsageAggregator<'_, Tz>,
        today: NaiveDate,
    ) -> Self {
        DashboardSnapshot {
            total_rolls: rolls.len(),
            todays_transactions: usage.transactions_on(today),
            total_transactions: usage.records().len(),
            recent: usage.recent(RECENT_LIMIT).into_iter().cloned().collect(),
        }
    }
}
