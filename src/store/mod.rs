//! Access to the external record store.
//!
//! [`RecordStore`] is the contract the rest of the crate depends on.
//! [`RestRecordStore`] talks to the managed store over its REST API,
//! [`FileRecordStore`] reads an offline dump, and [`MemoryRecordStore`] keeps
//! everything in-process.

mod file;
mod memory;
mod rest;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use rest::RestRecordStore;

use anyhow::Result;

use crate::model::{NewRoll, NewUsage, RollSpec, UsagePatch, UsageRecord};

/// Read and write access to usage transactions and the roll catalog.
///
/// `list_usage` returns only rows that passed validation; malformed rows are
/// skipped and logged by the implementation.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_usage(&self) -> Result<Vec<UsageRecord>>;

    async fn list_rolls(&self) -> Result<Vec<RollSpec>>;

    async fn create_usage(&self, usage: &NewUsage) -> Result<UsageRecord>;

    async fn update_usage(&self, id: &str, patch: &UsagePatch) -> Result<UsageRecord>;

    async fn delete_usage(&self, id: &str) -> Result<()>;

    async fn create_roll(&self, roll: &NewRoll) -> Result<RollSpec>;

    async fn update_roll(&self, id: &str, roll: &NewRoll) -> Result<RollSpec>;

    async fn delete_roll(&self, id: &str) -> Result<()>;
}
