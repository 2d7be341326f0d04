//! Record types shared by the store, the aggregator and the CLI.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecordError, TrackerError};

/// Display projection of a roll, embedded in each usage row by the store join.
///
/// May be stale if the roll was edited after the usage row was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollProjection {
    pub barcode: String,
    pub roll_name: String,
}

/// One logged consumption of a packaging roll on a machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub id: String,
    pub roll_id: String,
    pub machine_number: String,
    pub pieces_counter: u64,
    pub line_number: Option<u32>,
    pub usage_date: DateTime<Utc>,
    pub operator_name: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "packaging_rolls")]
    pub roll: RollProjection,
}

/// A usage row exactly as the record store returns it, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUsageRecord {
    pub id: String,
    #[serde(default)]
    pub roll_id: String,
    #[serde(default)]
    pub machine_number: String,
    pub pieces_counter: Option<Value>,
    pub line_number: Option<Value>,
    pub usage_date: Option<String>,
    pub operator_name: Option<String>,
    pub notes: Option<String>,
    pub packaging_rolls: Option<RollProjection>,
}

impl RawUsageRecord {
    /// Validates the row. Timestamps without an offset are read as wall-clock
    /// time in `tz`.
    pub fn into_record<Tz: TimeZone>(self, tz: &Tz) -> Result<UsageRecord, RecordError> {
        let pieces_counter = parse_pieces(self.pieces_counter.as_ref())?;
        let line_number = parse_line(self.line_number.as_ref())?;
        let usage_date = match self.usage_date.as_deref() {
            None => return Err(RecordError::MissingDate),
            Some(text) => parse_usage_date_in(text, tz)
                .ok_or_else(|| RecordError::InvalidDate(text.to_string()))?,
        };
        let roll = self.packaging_rolls.ok_or(RecordError::MissingRoll)?;

        Ok(UsageRecord {
            id: self.id,
            roll_id: self.roll_id,
            machine_number: self.machine_number,
            pieces_counter,
            line_number,
            usage_date,
            operator_name: self.operator_name,
            notes: self.notes,
            roll,
        })
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn parse_pieces(value: Option<&Value>) -> Result<u64, RecordError> {
    let text = value
        .and_then(value_text)
        .filter(|t| !t.is_empty())
        .ok_or(RecordError::MissingPieces)?;

    if let Ok(n) = text.parse::<u64>() {
        return Ok(n);
    }

    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f < 0.0 => Err(RecordError::NegativePieces(text)),
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f < u64::MAX as f64 => Ok(f as u64),
        _ => Err(RecordError::NonNumericPieces(text)),
    }
}

/// Zero is treated as "no line", matching how the dashboard filters lines.
fn parse_line(value: Option<&Value>) -> Result<Option<u32>, RecordError> {
    let Some(text) = value.and_then(value_text).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let line = match text.parse::<u32>() {
        Ok(n) => n,
        Err(_) => match text.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
                f as u32
            }
            _ => return Err(RecordError::InvalidLine(text)),
        },
    };

    Ok((line != 0).then_some(line))
}

/// Parses a store timestamp, reading naive timestamps as UTC.
pub fn parse_usage_date(text: &str) -> Option<DateTime<Utc>> {
    parse_usage_date_in(text, &Utc)
}

/// Parses a store timestamp, reading naive timestamps as local time in `tz`.
///
/// A naive time repeated by a DST fall-back resolves to its earlier instant;
/// one skipped by a spring-forward gap is rejected.
pub fn parse_usage_date_in<Tz: TimeZone>(text: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollStatus {
    #[default]
    Active,
    Inactive,
    Deprecated,
}

impl RollStatus {
    pub const ALL: [RollStatus; 3] = [
        RollStatus::Active,
        RollStatus::Inactive,
        RollStatus::Deprecated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RollStatus::Active => "active",
            RollStatus::Inactive => "inactive",
            RollStatus::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for RollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RollStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(RollStatus::Active),
            "inactive" => Ok(RollStatus::Inactive),
            "deprecated" => Ok(RollStatus::Deprecated),
            _ => Err(TrackerError::InvalidStatus(s.to_string())),
        }
    }
}

/// A packaging roll in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollSpec {
    pub id: String,
    pub barcode: String,
    pub roll_name: String,
    pub width_mm: Option<u32>,
    pub length_m: Option<f64>,
    pub weight_kg: Option<f64>,
    pub supplier: Option<String>,
    #[serde(default)]
    pub status: RollStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl RollSpec {
    pub fn projection(&self) -> RollProjection {
        RollProjection {
            barcode: self.barcode.clone(),
            roll_name: self.roll_name.clone(),
        }
    }
}

/// Payload for logging a new usage transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUsage {
    pub roll_id: String,
    pub machine_number: String,
    pub pieces_counter: u64,
    pub line_number: Option<u32>,
    pub operator_name: Option<String>,
    pub notes: Option<String>,
}

/// Replacement values for the editable fields of a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsagePatch {
    pub machine_number: String,
    pub pieces_counter: u64,
    pub line_number: Option<u32>,
    pub operator_name: Option<String>,
    pub notes: Option<String>,
}

/// Payload for creating or replacing a catalog roll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRoll {
    pub barcode: String,
    pub roll_name: String,
    pub width_mm: Option<u32>,
    pub length_m: Option<f64>,
    pub weight_kg: Option<f64>,
    pub supplier: Option<String>,
    pub status: RollStatus,
}

impl NewRoll {
    /// Barcode and roll name are required; everything else is optional.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.barcode.trim().is_empty() {
            return Err(TrackerError::MissingField("barcode"));
        }
        if self.roll_name.trim().is_empty() {
            return Err(TrackerError::MissingField("roll_name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};
    use serde_json::json;

    fn accept(row: RawUsageRecord) -> Result<UsageRecord, RecordError> {
        row.into_record(&Utc)
    }

    fn raw(pieces: Value) -> RawUsageRecord {
        RawUsageRecord {
            id: "u1".to_string(),
            roll_id: "r1".to_string(),
            machine_number: "M-1".to_string(),
            pieces_counter: Some(pieces),
            line_number: None,
            usage_date: Some("2024-01-01T08:00:00Z".to_string()),
            operator_name: None,
            notes: None,
            packaging_rolls: Some(RollProjection {
                barcode: "BC1".to_string(),
                roll_name: "Roll A".to_string(),
            }),
        }
    }

    #[test]
    fn test_accepts_integer_pieces() {
        let record = accept(raw(json!(100))).unwrap();
        assert_eq!(record.pieces_counter, 100);
        assert_eq!(record.roll.roll_name, "Roll A");
    }

    #[test]
    fn test_accepts_whole_float_and_numeric_string() {
        assert_eq!(accept(raw(json!(12.0))).unwrap().pieces_counter, 12);
        assert_eq!(accept(raw(json!(" 40 "))).unwrap().pieces_counter, 40);
    }

    #[test]
    fn test_rejects_negative_pieces() {
        let err = accept(raw(json!(-5))).unwrap_err();
        assert_eq!(err, RecordError::NegativePieces("-5".to_string()));
    }

    #[test]
    fn test_rejects_non_numeric_pieces() {
        assert!(matches!(
            accept(raw(json!("lots"))),
            Err(RecordError::NonNumericPieces(_))
        ));
        assert!(matches!(
            accept(raw(json!("NaN"))),
            Err(RecordError::NonNumericPieces(_))
        ));
        assert!(matches!(
            accept(raw(json!(2.5))),
            Err(RecordError::NonNumericPieces(_))
        ));
    }

    #[test]
    fn test_missing_pieces() {
        let mut row = raw(json!(1));
        row.pieces_counter = None;
        assert_eq!(accept(row).unwrap_err(), RecordError::MissingPieces);
    }

    #[test]
    fn test_line_number_zero_and_empty_are_absent() {
        let mut row = raw(json!(1));
        row.line_number = Some(json!(0));
        assert_eq!(accept(row.clone()).unwrap().line_number, None);

        row.line_number = Some(json!(""));
        assert_eq!(accept(row.clone()).unwrap().line_number, None);

        row.line_number = Some(json!("3"));
        assert_eq!(accept(row).unwrap().line_number, Some(3));
    }

    #[test]
    fn test_negative_line_is_rejected() {
        let mut row = raw(json!(1));
        row.line_number = Some(json!(-2));
        assert!(matches!(
            accept(row),
            Err(RecordError::InvalidLine(_))
        ));
    }

    #[test]
    fn test_bad_or_missing_date() {
        let mut row = raw(json!(1));
        row.usage_date = Some("yesterday".to_string());
        assert_eq!(
            accept(row.clone()).unwrap_err(),
            RecordError::InvalidDate("yesterday".to_string())
        );

        row.usage_date = None;
        assert_eq!(accept(row).unwrap_err(), RecordError::MissingDate);
    }

    #[test]
    fn test_missing_roll_projection() {
        let mut row = raw(json!(1));
        row.packaging_rolls = None;
        assert_eq!(accept(row).unwrap_err(), RecordError::MissingRoll);
    }

    #[test]
    fn test_parse_usage_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_usage_date("2024-01-01T08:00"), Some(expected));
        assert_eq!(parse_usage_date("2024-01-01T08:00:00"), Some(expected));
        assert_eq!(parse_usage_date("2024-01-01T08:00:00.000Z"), Some(expected));
        assert_eq!(parse_usage_date("2024-01-01T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_usage_date("2024-01-01 08:00:00+00"), Some(expected));
        assert_eq!(parse_usage_date("not a date"), None);
    }

    #[test]
    fn test_naive_date_is_read_in_the_given_zone() {
        let hawaii = FixedOffset::west_opt(10 * 3600).unwrap();
        assert_eq!(
            parse_usage_date_in("2024-01-01T08:00", &hawaii),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap())
        );
        // An explicit offset wins over the zone.
        assert_eq!(
            parse_usage_date_in("2024-01-01T08:00:00Z", &hawaii),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap())
        );

        let mut row = raw(json!(1));
        row.usage_date = Some("2024-01-01 08:00:00".to_string());
        let record = row.into_record(&hawaii).unwrap();
        assert_eq!(record.usage_date.with_timezone(&hawaii).hour(), 8);
    }

    #[test]
    fn test_rejects_pieces_past_u64_range() {
        assert!(matches!(
            accept(raw(json!("18446744073709551616"))),
            Err(RecordError::NonNumericPieces(_))
        ));
        assert!(matches!(
            accept(raw(json!(18446744073709551616.0))),
            Err(RecordError::NonNumericPieces(_))
        ));
        assert_eq!(
            accept(raw(json!("18446744073709551615"))).unwrap().pieces_counter,
            u64::MAX
        );
    }

    #[test]
    fn test_roll_status_round_trip() {
        for status in RollStatus::ALL {
            assert_eq!(status.to_string().parse::<RollStatus>().unwrap(), status);
        }
        assert_eq!("Deprecated".parse::<RollStatus>().unwrap(), RollStatus::Deprecated);
        assert!("retired".parse::<RollStatus>().is_err());
    }

    #[test]
    fn test_roll_spec_defaults_status() {
        let roll: RollSpec = serde_json::from_value(json!({
            "id": "r1",
            "barcode": "BC1",
            "roll_name": "Roll A",
            "width_mm": 250,
            "length_m": null,
            "weight_kg": 12.5,
            "supplier": "Acme",
            "created_at": null
        }))
        .unwrap();
        assert_eq!(roll.status, RollStatus::Active);
        assert_eq!(roll.width_mm, Some(250));
    }

    #[test]
    fn test_new_roll_validation() {
        let mut roll = NewRoll {
            barcode: "BC1".to_string(),
            roll_name: "Roll A".to_string(),
            width_mm: None,
            length_m: None,
            weight_kg: None,
            supplier: None,
            status: RollStatus::Active,
        };
        assert!(roll.validate().is_ok());

        roll.roll_name = "  ".to_string();
        assert_eq!(roll.validate(), Err(TrackerError::MissingField("roll_name")));

        roll.barcode = String::new();
        assert_eq!(roll.validate(), Err(TrackerError::MissingField("barcode")));
    }
}
