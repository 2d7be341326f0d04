use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{RecordError, TrackerError};
use crate::ingest::{Ingested, Unreadable, accept_rows, accept_values};
use crate::model::{
    NewRoll, NewUsage, RawUsageRecord, RollProjection, RollSpec, UsagePatch, UsageRecord,
};
use crate::store::RecordStore;

/// One row of a flattened usage dump, with the roll projection inlined.
#[derive(Debug, Deserialize)]
struct UsageRow {
    id: String,
    roll_id: String,
    machine_number: String,
    pieces_counter: Option<String>,
    line_number: Option<String>,
    usage_date: Option<String>,
    operator_name: Option<String>,
    notes: Option<String>,
    barcode: String,
    roll_name: String,
}

impl From<UsageRow> for RawUsageRecord {
    fn from(row: UsageRow) -> Self {
        RawUsageRecord {
            id: row.id,
            roll_id: row.roll_id,
            machine_number: row.machine_number,
            pieces_counter: row.pieces_counter.map(Value::String),
            line_number: row.line_number.map(Value::String),
            usage_date: row.usage_date,
            operator_name: row.operator_name,
            notes: row.notes,
            packaging_rolls: Some(RollProjection {
                barcode: row.barcode,
                roll_name: row.roll_name,
            }),
        }
    }
}

/// Read-only store over an offline dump.
///
/// Usage rows come from a `.json` array of store rows or a flattened `.csv`;
/// the optional roll catalog from a `.json` or `.csv` of roll rows. Timestamps
/// without an offset are read in the store's zone, UTC unless set with
/// [`FileRecordStore::with_zone`].
pub struct FileRecordStore<Tz = Utc> {
    usage_path: PathBuf,
    rolls_path: Option<PathBuf>,
    zone: Tz,
}

impl FileRecordStore {
    pub fn new(usage_path: impl Into<PathBuf>) -> Self {
        Self {
            usage_path: usage_path.into(),
            rolls_path: None,
            zone: Utc,
        }
    }
}

impl<Tz: TimeZone> FileRecordStore<Tz> {
    pub fn with_rolls(mut self, rolls_path: impl Into<PathBuf>) -> Self {
        self.rolls_path = Some(rolls_path.into());
        self
    }

    pub fn with_zone<Z: TimeZone>(self, zone: Z) -> FileRecordStore<Z> {
        FileRecordStore {
            usage_path: self.usage_path,
            rolls_path: self.rolls_path,
            zone,
        }
    }

    fn read_only(&self) -> anyhow::Error {
        TrackerError::ReadOnlyStore(self.usage_path.display().to_string()).into()
    }

    fn load_usage(&self) -> Result<Ingested> {
        let path = self.usage_path.as_path();
        match extension(path) {
            Some("json") => Ok(accept_values(load_json(path)?, &self.zone)),
            Some("csv") => Ok(accept_rows(load_usage_csv(path)?, &self.zone)),
            _ => bail!("unsupported usage file {} (expected .json or .csv)", path.display()),
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads every usage row, keeping a row that does not fit [`UsageRow`] as a
/// rejection keyed by its record number.
fn load_usage_csv(path: &Path) -> Result<Vec<Result<RawUsageRecord, Unreadable>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);

    let rows = rdr
        .deserialize::<UsageRow>()
        .enumerate()
        .map(|(index, result)| {
            result.map(RawUsageRecord::from).map_err(|e| {
                (
                    format!("row {}", index + 1),
                    RecordError::Malformed(e.to_string()),
                )
            })
        })
        .collect();
    Ok(rows)
}

#[async_trait]
impl<Tz: TimeZone + Send + Sync> RecordStore for FileRecordStore<Tz> {
    #[tracing::instrument(skip(self), fields(path = %self.usage_path.display()))]
    async fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let ingested = self.load_usage()?;
        if !ingested.rejected.is_empty() {
            warn!(
                rejected = ingested.rejected.len(),
                "Some usage rows were skipped"
            );
        }
        info!(records = ingested.records.len(), "Usage records loaded");
        Ok(ingested.records)
    }

    async fn list_rolls(&self) -> Result<Vec<RollSpec>> {
        let Some(path) = &self.rolls_path else {
            return Ok(Vec::new());
        };
        match extension(path) {
            Some("json") => load_json(path),
            Some("csv") => load_csv(path),
            _ => bail!("unsupported roll file {} (expected .json or .csv)", path.display()),
        }
    }

    async fn create_usage(&self, _usage: &NewUsage) -> Result<UsageRecord> {
        Err(self.read_only())
    }

    async fn update_usage(&self, _id: &str, _patch: &UsagePatch) -> Result<UsageRecord> {
        Err(self.read_only())
    }

    async fn delete_usage(&self, _id: &str) -> Result<()> {
        Err(self.read_only())
    }

    async fn create_roll(&self, _roll: &NewRoll) -> Result<RollSpec> {
        Err(self.read_only())
    }

    async fn update_roll(&self, _id: &str, _roll: &NewRoll) -> Result<RollSpec> {
        Err(self.read_only())
    }

    async fn delete_roll(&self, _id: &str) -> Result<()> {
        Err(self.read_only())
    }
}
