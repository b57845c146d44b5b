use super::{RecordId, RecordStore, StoreStats, StoredRecord};
use crate::error::StoreError;
use crate::extract::DataKind;
use crate::message::{Message, MessageId};
use crate::scorer::{RiskLevel, Verdict};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL UNIQUE,
        subject TEXT NOT NULL,
        sender_name TEXT NOT NULL,
        sender_email TEXT NOT NULL,
        received_at TEXT,
        body TEXT NOT NULL,
        has_attachments INTEGER NOT NULL DEFAULT 0,
        score INTEGER NOT NULL,
        is_flagged INTEGER NOT NULL DEFAULT 0,
        risk_level TEXT NOT NULL,
        stored_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS analyses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id INTEGER NOT NULL REFERENCES messages(id),
        score INTEGER NOT NULL,
        risk_level TEXT NOT NULL,
        is_flagged INTEGER NOT NULL,
        reasons TEXT NOT NULL,
        urls_found TEXT NOT NULL,
        analyzed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS extracted_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id INTEGER NOT NULL REFERENCES messages(id),
        data_type TEXT NOT NULL,
        value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (record_id, data_type, value)
    );

    CREATE INDEX IF NOT EXISTS idx_messages_flagged ON messages (is_flagged, id);
";

/// SQLite-backed record store. The `UNIQUE(message_id)` constraint is the
/// final word on duplicates.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Row shape of the flagged-records query before timestamps and JSON
/// columns are decoded.
struct RawRecord {
    record_id: i64,
    message_id: String,
    subject: String,
    sender_name: String,
    sender_email: String,
    received_at: Option<String>,
    body: String,
    has_attachments: bool,
    score: u32,
    risk_level: String,
    is_flagged: bool,
    stored_at: String,
    reasons: String,
    urls_found: String,
    analyzed_at: String,
}

impl SqliteStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("database lock poisoned: {e}")))
    }

    pub fn extracted(&self, record: RecordId) -> Result<Vec<(DataKind, String)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT data_type, value FROM extracted_data WHERE record_id = ? ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![record.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(kind, value)| -> Result<_, StoreError> {
                let kind = kind.parse::<DataKind>().map_err(StoreError::Corrupt)?;
                Ok((kind, value))
            })
            .collect()
    }

    fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{value}': {e}")))
    }

    fn decode(raw: RawRecord) -> Result<StoredRecord, StoreError> {
        let reasons: Vec<String> = serde_json::from_str(&raw.reasons)?;
        let urls_found: BTreeSet<String> = serde_json::from_str(&raw.urls_found)?;
        let received_at = raw
            .received_at
            .as_deref()
            .map(Self::parse_time)
            .transpose()?;

        Ok(StoredRecord {
            record_id: RecordId(raw.record_id),
            message: Message {
                id: MessageId::new(raw.message_id),
                subject: raw.subject,
                sender_display_name: raw.sender_name,
                sender_email: raw.sender_email,
                received_at,
                body: raw.body,
                has_attachments: raw.has_attachments,
            },
            verdict: Verdict {
                score: raw.score,
                risk_level: raw
                    .risk_level
                    .parse::<RiskLevel>()
                    .map_err(StoreError::Corrupt)?,
                is_flagged: raw.is_flagged,
                reasons,
                urls_found,
                analyzed_at: Self::parse_time(&raw.analyzed_at)?,
            },
            stored_at: Self::parse_time(&raw.stored_at)?,
        })
    }
}

impl RecordStore for SqliteStore {
    fn exists(&self, id: &MessageId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT id FROM messages WHERE message_id = ?",
                params![id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save(&self, message: &Message, verdict: &Verdict) -> Result<RecordId, StoreError> {
        let reasons = serde_json::to_string(&verdict.reasons)?;
        let urls_found = serde_json::to_string(&verdict.urls_found)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO messages (
                message_id, subject, sender_name, sender_email, received_at,
                body, has_attachments, score, is_flagged, risk_level, stored_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                message.id.as_str(),
                message.subject,
                message.sender_display_name,
                message.sender_email,
                message.received_at.map(|t| t.to_rfc3339()),
                message.body,
                message.has_attachments,
                verdict.score,
                verdict.is_flagged,
                verdict.risk_level.as_str(),
                Utc::now().to_rfc3339(),
            ],
        );
        if let Err(err) = inserted {
            return Err(match StoreError::from(err) {
                StoreError::Duplicate(_) => StoreError::Duplicate(message.id.to_string()),
                other => other,
            });
        }
        let record_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO analyses (
                record_id, score, risk_level, is_flagged, reasons, urls_found, analyzed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record_id,
                verdict.score,
                verdict.risk_level.as_str(),
                verdict.is_flagged,
                reasons,
                urls_found,
                verdict.analyzed_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(RecordId(record_id))
    }

    fn save_extracted(
        &self,
        record: RecordId,
        kind: DataKind,
        value: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO extracted_data (record_id, data_type, value, created_at)
             VALUES (?, ?, ?, ?)",
            params![record.0, kind.as_str(), value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let (total, flagged): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_flagged), 0) FROM messages",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt =
            conn.prepare("SELECT risk_level, COUNT(*) FROM messages GROUP BY risk_level")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = StoreStats {
            total: total as u64,
            flagged: flagged as u64,
            ..Default::default()
        };
        for (level, count) in rows {
            let level = level.parse::<RiskLevel>().map_err(StoreError::Corrupt)?;
            stats.by_risk_level.insert(level, count as u64);
        }

        Ok(stats)
    }

    fn flagged(&self, limit: usize) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.message_id, m.subject, m.sender_name, m.sender_email,
                    m.received_at, m.body, m.has_attachments, m.score, m.risk_level,
                    m.is_flagged, m.stored_at, a.reasons, a.urls_found, a.analyzed_at
             FROM messages m
             JOIN analyses a ON a.record_id = m.id
             WHERE m.is_flagged = 1
             ORDER BY m.id DESC
             LIMIT ?",
        )?;

        let raw = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RawRecord {
                    record_id: row.get(0)?,
                    message_id: row.get(1)?,
                    subject: row.get(2)?,
                    sender_name: row.get(3)?,
                    sender_email: row.get(4)?,
                    received_at: row.get(5)?,
                    body: row.get(6)?,
                    has_attachments: row.get(7)?,
                    score: row.get(8)?,
                    risk_level: row.get(9)?,
                    is_flagged: row.get(10)?,
                    stored_at: row.get(11)?,
                    reasons: row.get(12)?,
                    urls_found: row.get(13)?,
                    analyzed_at: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter().map(Self::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::RiskScorer;

    fn scored(message: Message) -> (Message, Verdict) {
        let verdict = RiskScorer::with_trusted_domains(&[])
            .unwrap()
            .score(&message);
        (message, verdict)
    }

    fn phishing(id: &str) -> (Message, Verdict) {
        scored(
            Message::new(id)
                .with_sender("Banco Itau", "promo@offers-secure-login.tk")
                .with_subject("Urgente: confirme sua senha")
                .with_body("digite sua senha em https://bit.ly/abc"),
        )
    }

    #[test]
    fn test_save_and_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (message, verdict) = scored(Message::new("m-1").with_sender("Ann", "ann@example.com"));

        assert!(!store.exists(&message.id).unwrap());
        let id = store.save(&message, &verdict).unwrap();
        assert_eq!(id, RecordId(1));
        assert!(store.exists(&message.id).unwrap());
    }

    #[test]
    fn test_duplicate_is_reported_and_not_stored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (message, verdict) = phishing("m-dup");

        store.save(&message, &verdict).unwrap();
        match store.save(&message, &verdict) {
            Err(StoreError::Duplicate(id)) => assert_eq!(id, "m-dup"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
        assert_eq!(store.stats().unwrap().total, 1);
    }

    #[test]
    fn test_stats_by_risk_level() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (m1, v1) = phishing("p-1");
        let (m2, v2) = scored(Message::new("s-1").with_sender("Ann", "ann@gmail.com"));
        let (m3, v3) = scored(Message::new("l-1"));
        for (m, v) in [(&m1, &v1), (&m2, &v2), (&m3, &v3)] {
            store.save(m, v).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.by_risk_level.get(&RiskLevel::Critical), Some(&1));
        assert_eq!(stats.by_risk_level.get(&RiskLevel::Safe), Some(&1));
        assert_eq!(stats.by_risk_level.get(&RiskLevel::Low), Some(&1));
    }

    #[test]
    fn test_flagged_round_trips_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (message, verdict) = phishing("p-2");
        store.save(&message, &verdict).unwrap();

        let flagged = store.flagged(10).unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].message, message);
        assert_eq!(flagged[0].verdict.reasons, verdict.reasons);
        assert_eq!(flagged[0].verdict.urls_found, verdict.urls_found);
        assert_eq!(flagged[0].verdict.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_extracted_values_are_deduplicated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (message, verdict) = scored(Message::new("x-1"));
        let id = store.save(&message, &verdict).unwrap();

        store.save_extracted(id, DataKind::Email, "a@b.com").unwrap();
        store.save_extracted(id, DataKind::Email, "a@b.com").unwrap();
        store.save_extracted(id, DataKind::Cpf, "123.456.789-09").unwrap();

        let values = store.extracted(id).unwrap();
        assert_eq!(
            values,
            vec![
                (DataKind::Email, "a@b.com".to_string()),
                (DataKind::Cpf, "123.456.789-09".to_string())
            ]
        );
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("messages.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }
}
