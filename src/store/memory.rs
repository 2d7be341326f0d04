use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::TrackerError;
use crate::model::{NewRoll, NewUsage, RollSpec, UsagePatch, UsageRecord};
use crate::store::RecordStore;

#[derive(Default)]
struct State {
    rolls: Vec<RollSpec>,
    usage: Vec<UsageRecord>,
}

/// In-process store used for tests and dry runs.
///
/// Mirrors the managed store's behavior: usage rows carry a roll projection
/// captured at insert time, and roll edits do not refresh existing rows.
pub struct MemoryRecordStore {
    state: RwLock<State>,
    next_id: AtomicU64,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::seeded(Vec::new(), Vec::new())
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rolls(rolls: Vec<RollSpec>) -> Self {
        Self::seeded(rolls, Vec::new())
    }

    pub fn seeded(rolls: Vec<RollSpec>, usage: Vec<UsageRecord>) -> Self {
        Self {
            state: RwLock::new(State { rolls, usage }),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn not_found(kind: &'static str, id: &str) -> anyhow::Error {
    TrackerError::NotFound {
        kind,
        id: id.to_string(),
    }
    .into()
}

fn ensure_unique_barcode(rolls: &[RollSpec], barcode: &str, except: Option<&str>) -> Result<()> {
    let clash = rolls
        .iter()
        .any(|r| r.barcode == barcode && Some(r.id.as_str()) != except);
    if clash {
        return Err(TrackerError::DuplicateBarcode(barcode.to_string()).into());
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let mut usage = self.state.read().await.usage.clone();
        usage.sort_by(|a, b| b.usage_date.cmp(&a.usage_date));
        Ok(usage)
    }

    async fn list_rolls(&self) -> Result<Vec<RollSpec>> {
        Ok(self.state.read().await.rolls.clone())
    }

    async fn create_usage(&self, usage: &NewUsage) -> Result<UsageRecord> {
        let mut state = self.state.write().await;
        let roll = state
            .rolls
            .iter()
            .find(|r| r.id == usage.roll_id)
            .ok_or_else(|| not_found("roll", &usage.roll_id))?
            .projection();

        let record = UsageRecord {
            id: self.next_id("usage"),
            roll_id: usage.roll_id.clone(),
            machine_number: usage.machine_number.clone(),
            pieces_counter: usage.pieces_counter,
            line_number: usage.line_number,
            usage_date: Utc::now(),
            operator_name: usage.operator_name.clone(),
            notes: usage.notes.clone(),
            roll,
        };
        state.usage.push(record.clone());
        debug!(id = %record.id, "Usage record stored");
        Ok(record)
    }

    async fn update_usage(&self, id: &str, patch: &UsagePatch) -> Result<UsageRecord> {
        let mut state = self.state.write().await;
        let record = state
            .usage
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("usage", id))?;

        record.machine_number = patch.machine_number.clone();
        record.pieces_counter = patch.pieces_counter;
        record.line_number = patch.line_number;
        record.operator_name = patch.operator_name.clone();
        record.notes = patch.notes.clone();
        Ok(record.clone())
    }

    async fn delete_usage(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.usage.len();
        state.usage.retain(|r| r.id != id);
        if state.usage.len() == before {
            return Err(not_found("usage", id));
        }
        Ok(())
    }

    async fn create_roll(&self, roll: &NewRoll) -> Result<RollSpec> {
        roll.validate()?;
        let mut state = self.state.write().await;
        ensure_unique_barcode(&state.rolls, &roll.barcode, None)?;

        let spec = RollSpec {
            id: self.next_id("roll"),
            barcode: roll.barcode.clone(),
            roll_name: roll.roll_name.clone(),
            width_mm: roll.width_mm,
            length_m: roll.length_m,
            weight_kg: roll.weight_kg,
            supplier: roll.supplier.clone(),
            status: roll.status,
            created_at: Some(Utc::now()),
        };
        state.rolls.push(spec.clone());
        Ok(spec)
    }

    async fn update_roll(&self, id: &str, roll: &NewRoll) -> Result<RollSpec> {
        roll.validate()?;
        let mut state = self.state.write().await;
        ensure_unique_barcode(&state.rolls, &roll.barcode, Some(id))?;

        let spec = state
            .rolls
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("roll", id))?;
        spec.barcode = roll.barcode.clone();
        spec.roll_name = roll.roll_name.clone();
        spec.width_mm = roll.width_mm;
        spec.length_m = roll.length_m;
        spec.weight_kg = roll.weight_kg;
        spec.supplier = roll.supplier.clone();
        spec.status = roll.status;
        Ok(spec.clone())
    }

    async fn delete_roll(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.rolls.len();
        state.rolls.retain(|r| r.id != id);
        if state.rolls.len() == before {
            return Err(not_found("roll", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RollStatus;

    fn new_roll(barcode: &str, name: &str) -> NewRoll {
        NewRoll {
            barcode: barcode.to_string(),
            roll_name: name.to_string(),
            width_mm: Some(300),
            length_m: None,
            weight_kg: None,
            supplier: None,
            status: RollStatus::Active,
        }
    }

    fn new_usage(roll_id: &str, pieces: u64) -> NewUsage {
        NewUsage {
            roll_id: roll_id.to_string(),
            machine_number: "M-1".to_string(),
            pieces_counter: pieces,
            line_number: None,
            operator_name: None,
            notes: None,
        }
    }

    fn kind_of(err: &anyhow::Error) -> Option<&TrackerError> {
        err.downcast_ref::<TrackerError>()
    }

    #[tokio::test]
    async fn test_usage_lifecycle() {
        let store = MemoryRecordStore::new();
        let roll = store.create_roll(&new_roll("BC1", "Roll A")).await.unwrap();

        let created = store.create_usage(&new_usage(&roll.id, 40)).await.unwrap();
        assert_eq!(created.roll.roll_name, "Roll A");

        let patch = UsagePatch {
            machine_number: "M-9".to_string(),
            pieces_counter: 55,
            line_number: Some(2),
            operator_name: Some("Kai".to_string()),
            notes: None,
        };
        let updated = store.update_usage(&created.id, &patch).await.unwrap();
        assert_eq!(updated.pieces_counter, 55);
        assert_eq!(updated.machine_number, "M-9");
        assert_eq!(updated.usage_date, created.usage_date);

        store.delete_usage(&created.id).await.unwrap();
        assert!(store.list_usage().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_usage_requires_known_roll() {
        let store = MemoryRecordStore::new();
        let err = store.create_usage(&new_usage("nope", 1)).await.unwrap_err();
        assert!(matches!(
            kind_of(&err),
            Some(TrackerError::NotFound { kind: "roll", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let store = MemoryRecordStore::new();
        assert!(store.delete_usage("x").await.is_err());
        assert!(store.delete_roll("x").await.is_err());
        let err = store
            .update_roll("x", &new_roll("BC", "Name"))
            .await
            .unwrap_err();
        assert!(matches!(kind_of(&err), Some(TrackerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let store = MemoryRecordStore::new();
        let first = store.create_roll(&new_roll("BC1", "A")).await.unwrap();
        let second = store.create_roll(&new_roll("BC2", "B")).await.unwrap();

        let err = store.create_roll(&new_roll("BC1", "C")).await.unwrap_err();
        assert_eq!(
            kind_of(&err),
            Some(&TrackerError::DuplicateBarcode("BC1".to_string()))
        );

        // Re-saving a roll with its own barcode is fine.
        store
            .update_roll(&first.id, &new_roll("BC1", "A2"))
            .await
            .unwrap();
        assert!(
            store
                .update_roll(&second.id, &new_roll("BC1", "B"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_roll_edit_leaves_usage_projection_stale() {
        let store = MemoryRecordStore::new();
        let roll = store.create_roll(&new_roll("BC1", "Old")).await.unwrap();
        store.create_usage(&new_usage(&roll.id, 1)).await.unwrap();

        store
            .update_roll(&roll.id, &new_roll("BC1", "New"))
            .await
            .unwrap();

        let usage = store.list_usage().await.unwrap();
        assert_eq!(usage[0].roll.roll_name, "Old");
    }

    #[tokio::test]
    async fn test_blank_roll_fields_rejected() {
        let store = MemoryRecordStore::new();
        let err = store.create_roll(&new_roll(" ", "A")).await.unwrap_err();
        assert_eq!(kind_of(&err), Some(&TrackerError::MissingField("barcode")));
    }
}
