pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::extract::DataKind;
use crate::message::{Message, MessageId};
use crate::scorer::{RiskLevel, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Surrogate key assigned when a message is first persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record_id: RecordId,
    pub message: Message,
    pub verdict: Verdict,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub flagged: u64,
    pub by_risk_level: BTreeMap<RiskLevel, u64>,
}

/// Durable home for scored messages.
///
/// Implementations must reject a second `save` for the same message id with
/// [`StoreError::Duplicate`], including when two callers race.
pub trait RecordStore: Send + Sync {
    fn exists(&self, id: &MessageId) -> Result<bool, StoreError>;

    /// Persist the message and its verdict as one unit.
    fn save(&self, message: &Message, verdict: &Verdict) -> Result<RecordId, StoreError>;

    /// Attach one extracted value to a record. Non-authoritative enrichment:
    /// callers log failures and carry on.
    fn save_extracted(
        &self,
        record: RecordId,
        kind: DataKind,
        value: &str,
    ) -> Result<(), StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Most recently stored flagged records, newest first.
    fn flagged(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError>;
}
