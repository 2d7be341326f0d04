//! Barcode-scan workflow: turns raw operator input into a usage record.

use anyhow::Result;
use tracing::info;

use crate::error::TrackerError;
use crate::model::{NewUsage, RollSpec, UsageRecord};
use crate::store::RecordStore;

/// Raw operator input from the scan screen, before validation.
#[derive(Debug, Clone, Default)]
pub struct ScanForm {
    pub barcode: String,
    pub machine_number: String,
    pub pieces_counter: String,
    pub line_number: String,
    pub operator_name: String,
    pub notes: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl ScanForm {
    /// Validates the form and looks the barcode up in `rolls`.
    pub fn resolve(&self, rolls: &[RollSpec]) -> Result<NewUsage, TrackerError> {
        let barcode = non_empty(&self.barcode).ok_or(TrackerError::MissingField("barcode"))?;
        let machine_number =
            non_empty(&self.machine_number).ok_or(TrackerError::MissingField("machine_number"))?;
        let pieces = non_empty(&self.pieces_counter)
            .ok_or(TrackerError::MissingField("pieces_counter"))?;

        let pieces_counter = pieces
            .parse::<u64>()
            .map_err(|_| TrackerError::InvalidNumber {
                field: "pieces_counter",
                value: pieces.clone(),
            })?;

        let line_number = match non_empty(&self.line_number) {
            None => None,
            Some(line) => {
                let n = line
                    .parse::<u32>()
                    .map_err(|_| TrackerError::InvalidNumber {
                        field: "line_number",
                        value: line.clone(),
                    })?;
                (n != 0).then_some(n)
            }
        };

        let roll = rolls
            .iter()
            .find(|r| r.barcode == barcode)
            .ok_or_else(|| TrackerError::BarcodeNotFound(barcode.clone()))?;

        Ok(NewUsage {
            roll_id: roll.id.clone(),
            machine_number,
            pieces_counter,
            line_number,
            operator_name: non_empty(&self.operator_name),
            notes: non_empty(&self.notes),
        })
    }
}

/// Resolves `form` against the current catalog and stores the usage.
#[tracing::instrument(skip(store, form), fields(barcode = %form.barcode.trim()))]
pub async fn record_scan(store: &dyn RecordStore, form: &ScanForm) -> Result<UsageRecord> {
    let rolls = store.list_rolls().await?;
    let usage = form.resolve(&rolls)?;
    let record = store.create_usage(&usage).await?;

    info!(
        "Recorded {} pcs for machine {}",
        record.pieces_counter, record.machine_number
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RollStatus;
    use crate::store::MemoryRecordStore;

    fn roll(id: &str, barcode: &str) -> RollSpec {
        RollSpec {
            id: id.to_string(),
            barcode: barcode.to_string(),
            roll_name: format!("Roll {id}"),
            width_mm: None,
            length_m: None,
            weight_kg: None,
            supplier: None,
            status: RollStatus::Active,
            created_at: None,
        }
    }

    fn form(barcode: &str, machine: &str, pieces: &str) -> ScanForm {
        ScanForm {
            barcode: barcode.to_string(),
            machine_number: machine.to_string(),
            pieces_counter: pieces.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_trims_and_matches_barcode() {
        let rolls = vec![roll("r1", "BC1"), roll("r2", "BC2")];
        let mut input = form("  BC2 ", " M-4 ", "120");
        input.line_number = "3".to_string();
        input.operator_name = "  ".to_string();
        input.notes = "jam cleared".to_string();

        let usage = input.resolve(&rolls).unwrap();

        assert_eq!(usage.roll_id, "r2");
        assert_eq!(usage.machine_number, "M-4");
        assert_eq!(usage.pieces_counter, 120);
        assert_eq!(usage.line_number, Some(3));
        assert_eq!(usage.operator_name, None);
        assert_eq!(usage.notes.as_deref(), Some("jam cleared"));
    }

    #[test]
    fn test_missing_fields() {
        let rolls = vec![roll("r1", "BC1")];
        assert_eq!(
            form("", "M-1", "1").resolve(&rolls),
            Err(TrackerError::MissingField("barcode"))
        );
        assert_eq!(
            form("BC1", " ", "1").resolve(&rolls),
            Err(TrackerError::MissingField("machine_number"))
        );
        assert_eq!(
            form("BC1", "M-1", "").resolve(&rolls),
            Err(TrackerError::MissingField("pieces_counter"))
        );
    }

    #[test]
    fn test_invalid_numbers() {
        let rolls = vec![roll("r1", "BC1")];
        assert_eq!(
            form("BC1", "M-1", "-5").resolve(&rolls),
            Err(TrackerError::InvalidNumber {
                field: "pieces_counter",
                value: "-5".to_string()
            })
        );

        let mut input = form("BC1", "M-1", "5");
        input.line_number = "two".to_string();
        assert!(matches!(
            input.resolve(&rolls),
            Err(TrackerError::InvalidNumber {
                field: "line_number",
                ..
            })
        ));
    }

    #[test]
    fn test_line_zero_means_no_line() {
        let rolls = vec![roll("r1", "BC1")];
        let mut input = form("BC1", "M-1", "5");
        input.line_number = "0".to_string();
        assert_eq!(input.resolve(&rolls).unwrap().line_number, None);
    }

    #[test]
    fn test_barcode_match_is_exact() {
        let rolls = vec![roll("r1", "BC1")];
        assert_eq!(
            form("bc1", "M-1", "5").resolve(&rolls),
            Err(TrackerError::BarcodeNotFound("bc1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_record_scan_stores_usage() {
        let store = MemoryRecordStore::with_rolls(vec![roll("r1", "BC1")]);
        let mut input = form("BC1", "M-2", "75");
        input.operator_name = "Dana".to_string();

        let record = record_scan(&store, &input).await.unwrap();

        assert_eq!(record.roll.barcode, "BC1");
        assert_eq!(record.operator_name.as_deref(), Some("Dana"));
        assert_eq!(store.list_usage().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_scan_unknown_barcode_stores_nothing() {
        let store = MemoryRecordStore::with_rolls(vec![roll("r1", "BC1")]);
        let err = record_scan(&store, &form("NOPE", "M-2", "75"))
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::BarcodeNotFound("NOPE".to_string()))
        );
        assert!(store.list_usage().await.unwrap().is_empty());
    }
}
