//! Output types produced by the usage aggregator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Pieces used on one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub label: String,
    pub total: u64,
}

/// Pieces used in the week starting on `week_start` (a Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyTotal {
    pub week_start: NaiveDate,
    pub label: String,
    pub total: u64,
}

/// Pieces used during one hour of the day, summed across all days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyTotal {
    pub hour: u32,
    pub label: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineTotal {
    pub machine_number: String,
    pub machine: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineTotal {
    pub line_number: u32,
    pub line: String,
    pub total: u64,
}

/// One slice of the top-rolls share chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollShare {
    pub name: String,
    pub total: u64,
}

/// Per-operator rollup. `operator` is a display label and may be truncated;
/// `operator_name` is the full grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorStats {
    pub operator_name: String,
    pub operator: String,
    pub transaction_count: u64,
    pub average_pieces: u64,
    pub total: u64,
}

/// Volume vs. average transaction size for one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineEfficiency {
    pub machine_number: String,
    pub machine: String,
    pub average_per_transaction: u64,
    pub transaction_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryTotals {
    pub total_pieces: u64,
    pub average_per_transaction: u64,
    pub distinct_machine_count: usize,
}

/// Every analytics view in one document, as rendered by the `report` command.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub schema_version: u8,
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub summary: SummaryTotals,
    pub daily_trend: Vec<DailyTotal>,
    pub weekly_trend: Vec<WeeklyTotal>,
    pub hourly_pattern: Vec<HourlyTotal>,
    pub machine_usage: Vec<MachineTotal>,
    pub line_usage: Vec<LineTotal>,
    pub roll_usage: Vec<RollShare>,
    pub operator_performance: Vec<OperatorStats>,
    pub machine_efficiency: Vec<MachineEfficiency>,
}
