//! Output formatting for usage data.
//!
//! Supports the raw-record CSV export and JSON rendering of the analytics
//! report.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use tracing::debug;

use crate::config::LocaleFormat;
use crate::model::UsageRecord;

pub const CSV_HEADERS: [&str; 7] = [
    "Roll Name",
    "Barcode",
    "Machine Number",
    "Pieces Counter",
    "Line",
    "Operator",
    "Date",
];

/// Serializes every record (not aggregated) to CSV text.
///
/// Each field is wrapped in double quotes. Embedded quote characters are
/// written as-is, not doubled, so a free-text field containing `"` yields a
/// row that strict CSV readers will misparse. Rows are separated by `\n` with
/// no trailing newline: N records give N+1 lines.
pub fn usage_csv<Tz: TimeZone>(records: &[UsageRecord], tz: &Tz, locale: &LocaleFormat) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(quote_row(CSV_HEADERS.iter().map(|h| h.to_string())));

    for record in records {
        let date = record
            .usage_date
            .with_timezone(tz)
            .naive_local()
            .format(&locale.datetime)
            .to_string();

        lines.push(quote_row([
            record.roll.roll_name.clone(),
            record.roll.barcode.clone(),
            record.machine_number.clone(),
            record.pieces_counter.to_string(),
            record.line_number.map(|l| l.to_string()).unwrap_or_default(),
            record.operator_name.clone().unwrap_or_default(),
            date,
        ]));
    }

    debug!(rows = records.len(), "CSV export rendered");
    lines.join("\n")
}

fn quote_row(cells: impl IntoIterator<Item = String>) -> String {
    cells
        .into_iter()
        .map(|cell| format!("\"{cell}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Suggested download name, e.g. `roll-usage-2024-01-31.csv`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("roll-usage-{}.csv", date.format("%Y-%m-%d"))
}

/// Renders any report value as pretty-printed JSON.
pub fn render_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Writes a report value as pretty-printed JSON to `path`, replacing the file.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {path}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    debug!(path, "JSON report written");
    Ok(())
}
