use super::{RecordId, RecordStore, StoreStats, StoredRecord};
use crate::error::StoreError;
use crate::extract::DataKind;
use crate::message::{Message, MessageId};
use crate::scorer::Verdict;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<StoredRecord>,
    by_message: HashMap<MessageId, RecordId>,
    extracted: Vec<(RecordId, DataKind, String)>,
}

/// Process-local record store. Check-and-insert happens under one lock, so
/// duplicate suppression holds across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store lock poisoned: {e}")))
    }

    pub fn records(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.lock()?.records.clone())
    }

    pub fn extracted(&self, record: RecordId) -> Result<Vec<(DataKind, String)>, StoreError> {
        Ok(self
            .lock()?
            .extracted
            .iter()
            .filter(|(id, _, _)| *id == record)
            .map(|(_, kind, value)| (*kind, value.clone()))
            .collect())
    }
}

impl RecordStore for MemoryStore {
    fn exists(&self, id: &MessageId) -> Result<bool, StoreError> {
        Ok(self.lock()?.by_message.contains_key(id))
    }

    fn save(&self, message: &Message, verdict: &Verdict) -> Result<RecordId, StoreError> {
        let mut state = self.lock()?;
        if state.by_message.contains_key(&message.id) {
            return Err(StoreError::Duplicate(message.id.to_string()));
        }

        let record_id = RecordId(state.records.len() as i64 + 1);
        state.by_message.insert(message.id.clone(), record_id);
        state.records.push(StoredRecord {
            record_id,
            message: message.clone(),
            verdict: verdict.clone(),
            stored_at: Utc::now(),
        });
        Ok(record_id)
    }

    fn save_extracted(
        &self,
        record: RecordId,
        kind: DataKind,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.records.iter().any(|r| r.record_id == record) {
            return Err(StoreError::Backend(format!("unknown record {record}")));
        }
        state.extracted.push((record, kind, value.to_string()));
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let state = self.lock()?;
        let mut stats = StoreStats::default();
        for record in &state.records {
            stats.total += 1;
            if record.verdict.is_flagged {
                stats.flagged += 1;
            }
            *stats
                .by_risk_level
                .entry(record.verdict.risk_level)
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn flagged(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .lock()?
            .records
            .iter()
            .rev()
            .filter(|r| r.verdict.is_flagged)
            .take(limit)
            .cloned()
            .collect())
    }
}
