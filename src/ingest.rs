//! Boundary between raw store rows and the aggregator.
//!
//! Malformed rows are skipped and logged; one bad row never aborts the batch.

use chrono::TimeZone;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::model::{RawUsageRecord, UsageRecord};

/// A row that could not even be read into a [`RawUsageRecord`], keyed by
/// whatever identifies it (its `id`, or its position in the dump).
pub type Unreadable = (String, RecordError);

/// Outcome of validating a batch of raw rows.
#[derive(Debug, Default)]
pub struct Ingested {
    pub records: Vec<UsageRecord>,
    pub rejected: Vec<(String, RecordError)>,
}

/// Validates every row, keeping the good ones in their original order.
pub fn accept_records<Tz: TimeZone>(rows: Vec<RawUsageRecord>, tz: &Tz) -> Ingested {
    accept_rows(rows.into_iter().map(Ok), tz)
}

/// Like [`accept_records`], for rows still in their JSON form. An element of
/// the wrong shape is rejected on its own.
pub fn accept_values<Tz: TimeZone>(values: Vec<Value>, tz: &Tz) -> Ingested {
    accept_rows(values.into_iter().map(read_value), tz)
}

fn read_value(value: Value) -> Result<RawUsageRecord, Unreadable> {
    let id = match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "?".to_string(),
    };
    serde_json::from_value(value).map_err(|e| (id, RecordError::Malformed(e.to_string())))
}

/// Validates rows that may already have failed to read.
pub fn accept_rows<Tz, I>(rows: I, tz: &Tz) -> Ingested
where
    Tz: TimeZone,
    I: IntoIterator<Item = Result<RawUsageRecord, Unreadable>>,
{
    let mut out = Ingested::default();

    for row in rows {
        let checked = row.and_then(|row| {
            let id = row.id.clone();
            row.into_record(tz).map_err(|e| (id, e))
        });
        match checked {
            Ok(record) => out.records.push(record),
            Err((id, e)) => {
                warn!(usage_id = %id, error = %e, "Skipping malformed usage record");
                out.rejected.push((id, e));
            }
        }
    }

    debug!(
        total = out.records.len() + out.rejected.len(),
        accepted = out.records.len(),
        rejected = out.rejected.len(),
        "Usage rows ingested"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RollProjection;
    use chrono::{FixedOffset, Timelike, Utc};
    use serde_json::json;

    fn row(id: &str, pieces: serde_json::Value) -> RawUsageRecord {
        RawUsageRecord {
            id: id.to_string(),
            roll_id: "r1".to_string(),
            machine_number: "M-1".to_string(),
            pieces_counter: Some(pieces),
            usage_date: Some("2024-03-05T10:00:00Z".to_string()),
            packaging_rolls: Some(RollProjection {
                barcode: "BC1".to_string(),
                roll_name: "Roll A".to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_skips_bad_rows_and_keeps_order() {
        let ingested = accept_records(vec![
            row("a", json!(10)),
            row("b", json!(-1)),
            row("c", json!(20)),
            row("d", json!("x")),
        ], &Utc);

        let ids: Vec<_> = ingested.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(ingested.rejected.len(), 2);
        assert_eq!(ingested.rejected[0].0, "b");
        assert!(matches!(
            ingested.rejected[0].1,
            RecordError::NegativePieces(_)
        ));
    }

    #[test]
    fn test_empty_batch() {
        let ingested = accept_records(Vec::new(), &Utc);
        assert!(ingested.records.is_empty());
        assert!(ingested.rejected.is_empty());
    }

    #[test]
    fn test_wrongly_typed_value_is_rejected_alone() {
        let good = json!({
            "id": "u1",
            "roll_id": "r1",
            "machine_number": "1",
            "pieces_counter": 10,
            "usage_date": "2024-03-05T10:00:00Z",
            "packaging_rolls": { "barcode": "BC1", "roll_name": "Roll A" }
        });
        let mut numeric_date = good.clone();
        numeric_date["id"] = json!("u2");
        numeric_date["usage_date"] = json!(1704096000);
        let mut no_id = good.clone();
        no_id.as_object_mut().unwrap().remove("id");

        let ingested = accept_values(vec![good, numeric_date, no_id, json!(42)], &Utc);

        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.records[0].id, "u1");
        let rejected: Vec<_> = ingested.rejected.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(rejected, vec!["u2", "?", "?"]);
        assert!(matches!(ingested.rejected[0].1, RecordError::Malformed(_)));
    }

    #[test]
    fn test_unreadable_rows_count_as_rejected() {
        let rows = vec![
            Ok(row("a", json!(1))),
            Err(("row 2".to_string(), RecordError::Malformed("bad".to_string()))),
            Ok(row("c", json!(-1))),
        ];
        let ingested = accept_rows(rows, &Utc);
        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.rejected.len(), 2);
        assert_eq!(ingested.rejected[0].0, "row 2");
    }

    #[test]
    fn test_naive_dates_follow_the_zone() {
        let mut naive = row("a", json!(1));
        naive.usage_date = Some("2024-01-01T08:00".to_string());
        let hawaii = FixedOffset::west_opt(10 * 3600).unwrap();

        let ingested = accept_records(vec![naive], &hawaii);
        let local = ingested.records[0].usage_date.with_timezone(&hawaii);
        assert_eq!(local.hour(), 8);
        assert_eq!(local.date_naive().to_string(), "2024-01-01");
    }
}
