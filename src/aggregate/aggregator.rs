use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::aggregate::types::{
    AnalyticsReport, DailyTotal, HourlyTotal, LineTotal, MachineEfficiency, MachineTotal,
    OperatorStats, RollShare, SummaryTotals, WeeklyTotal,
};
use crate::aggregate::utility::{group_in_order, rounded_average, truncate_label, week_start};
use crate::config::LocaleFormat;
use crate::export::usage_csv;
use crate::model::UsageRecord;

/// Ranked views (rolls, operators) keep only this many entries.
pub const TOP_N: usize = 8;

/// Operator labels longer than this are shortened for display.
pub const OPERATOR_LABEL_LEN: usize = 12;

pub const UNKNOWN_OPERATOR: &str = "Unknown";

/// Stateless analytics over a snapshot of usage records.
///
/// Every method recomputes its view from the borrowed slice; nothing is
/// cached, so calling a method twice gives the same answer. Calendar dates
/// and hours are taken in `tz`.
pub struct UsageAggregator<'a, Tz: TimeZone> {
    records: &'a [UsageRecord],
    tz: Tz,
    locale: LocaleFormat,
}

impl<'a, Tz: TimeZone> UsageAggregator<'a, Tz> {
    pub fn new(records: &'a [UsageRecord], tz: Tz) -> Self {
        Self {
            records,
            tz,
            locale: LocaleFormat::default(),
        }
    }

    pub fn with_locale(mut self, locale: LocaleFormat) -> Self {
        self.locale = locale;
        self
    }

    pub fn records(&self) -> &'a [UsageRecord] {
        self.records
    }

    fn local_time(&self, record: &UsageRecord) -> NaiveDateTime {
        record.usage_date.with_timezone(&self.tz).naive_local()
    }

    fn date_label(&self, date: NaiveDate) -> String {
        date.format(&self.locale.date).to_string()
    }

    /// Total pieces per local calendar day, oldest first.
    pub fn daily_trend(&self) -> Vec<DailyTotal> {
        let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in self.records {
            let total = days.entry(self.local_time(record).date()).or_default();
            *total = total.saturating_add(record.pieces_counter);
        }

        days.into_iter()
            .map(|(date, total)| DailyTotal {
                date,
                label: self.date_label(date),
                total,
            })
            .collect()
    }

    /// Total pieces per Sunday-started week, oldest first.
    pub fn weekly_trend(&self) -> Vec<WeeklyTotal> {
        let mut weeks: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in self.records {
            let total = weeks
                .entry(week_start(self.local_time(record).date()))
                .or_default();
            *total = total.saturating_add(record.pieces_counter);
        }

        weeks
            .into_iter()
            .map(|(week_start, total)| WeeklyTotal {
                week_start,
                label: self.date_label(week_start),
                total,
            })
            .collect()
    }

    /// Always 24 entries, `00:00` through `23:00`, zero where nothing happened.
    pub fn hourly_pattern(&self) -> Vec<HourlyTotal> {
        let mut hours = [0u64; 24];
        for record in self.records {
            let hour = self.local_time(record).hour() as usize;
            hours[hour] = hours[hour].saturating_add(record.pieces_counter);
        }

        (0u32..24)
            .map(|hour| HourlyTotal {
                hour,
                label: format!("{hour:02}:00"),
                total: hours[hour as usize],
            })
            .collect()
    }

    /// Total pieces per machine, largest first.
    pub fn machine_usage(&self) -> Vec<MachineTotal> {
        let mut groups = group_in_order(self.records, |r| Some(r.machine_number.as_str()));
        groups.sort_by(|a, b| b.1.total.cmp(&a.1.total));

        groups
            .into_iter()
            .map(|(machine, bucket)| MachineTotal {
                machine_number: machine.to_string(),
                machine: format!("Machine {machine}"),
                total: bucket.total,
            })
            .collect()
    }

    /// Total pieces per production line in line order. Unassigned records are left out.
    pub fn line_usage(&self) -> Vec<LineTotal> {
        let mut lines: BTreeMap<u32, u64> = BTreeMap::new();
        for record in self.records {
            if let Some(line) = record.line_number {
                let total = lines.entry(line).or_default();
                *total = total.saturating_add(record.pieces_counter);
            }
        }

        lines
            .into_iter()
            .map(|(line_number, total)| LineTotal {
                line_number,
                line: format!("Line {line_number}"),
                total,
            })
            .collect()
    }

    /// The [`TOP_N`] most used rolls by name.
    pub fn roll_usage(&self) -> Vec<RollShare> {
        let mut groups = group_in_order(self.records, |r| Some(r.roll.roll_name.as_str()));
        groups.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        groups.truncate(TOP_N);

        groups
            .into_iter()
            .map(|(name, bucket)| RollShare {
                name: name.to_string(),
                total: bucket.total,
            })
            .collect()
    }

    /// The [`TOP_N`] operators by total pieces.
    pub fn operator_performance(&self) -> Vec<OperatorStats> {
        let mut groups = group_in_order(self.records, |r| Some(operator_key(r)));
        groups.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        groups.truncate(TOP_N);

        groups
            .into_iter()
            .map(|(name, bucket)| OperatorStats {
                operator_name: name.to_string(),
                operator: truncate_label(name, OPERATOR_LABEL_LEN),
                transaction_count: bucket.count,
                average_pieces: rounded_average(bucket.total, bucket.count),
                total: bucket.total,
            })
            .collect()
    }

    /// Average transaction size per machine, busiest machine first.
    pub fn machine_efficiency(&self) -> Vec<MachineEfficiency> {
        let mut groups = group_in_order(self.records, |r| Some(r.machine_number.as_str()));
        groups.sort_by(|a, b| b.1.count.cmp(&a.1.count));

        groups
            .into_iter()
            .map(|(machine, bucket)| MachineEfficiency {
                machine_number: machine.to_string(),
                machine: format!("M-{machine}"),
                average_per_transaction: rounded_average(bucket.total, bucket.count),
                transaction_count: bucket.count,
            })
            .collect()
    }

    pub fn summary_totals(&self) -> SummaryTotals {
        let total_pieces = self
            .records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.pieces_counter));
        let machines: HashSet<&str> = self
            .records
            .iter()
            .map(|r| r.machine_number.as_str())
            .collect();

        SummaryTotals {
            total_pieces,
            average_per_transaction: rounded_average(total_pieces, self.records.len() as u64),
            distinct_machine_count: machines.len(),
        }
    }

    /// Number of transactions logged on the given local date.
    pub fn transactions_on(&self, date: NaiveDate) -> usize {
        self.records
            .iter()
            .filter(|r| self.local_time(r).date() == date)
            .count()
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&'a UsageRecord> {
        let mut records: Vec<&'a UsageRecord> = self.records.iter().collect();
        records.sort_by(|a, b| b.usage_date.cmp(&a.usage_date));
        records.truncate(limit);
        records
    }

    /// Full record list as CSV; see [`usage_csv`].
    pub fn export_csv(&self) -> String {
        usage_csv(self.records, &self.tz, &self.locale)
    }

    pub fn report(&self) -> AnalyticsReport {
        AnalyticsReport {
            schema_version: 1,
            generated_at: Utc::now(),
            record_count: self.records.len(),
            summary: self.summary_totals(),
            daily_trend: self.daily_trend(),
            weekly_trend: self.weekly_trend(),
            hourly_pattern: self.hourly_pattern(),
            machine_usage: self.machine_usage(),
            line_usage: self.line_usage(),
            roll_usage: self.roll_usage(),
            operator_performance: self.operator_performance(),
            machine_efficiency: self.machine_efficiency(),
        }
    }
}

fn operator_key(record: &UsageRecord) -> &str {
    record
        .operator_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_OPERATOR)
}
