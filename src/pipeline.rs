use crate::error::StoreError;
use crate::extract::DataExtractor;
use crate::message::Message;
use crate::scorer::{RiskScorer, Verdict};
use crate::store::{RecordId, RecordStore};
use std::sync::Arc;

/// What happened to one message on its way through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Persisted { record_id: RecordId, verdict: Verdict },
    /// Already stored by an earlier sweep; not scored again.
    DuplicateSkipped,
    Failed(String),
}

impl Outcome {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Outcome::Persisted { verdict, .. } if verdict.is_flagged)
    }
}

/// Dedup, score, persist, enrich.
pub struct IngestPipeline {
    scorer: RiskScorer,
    store: Arc<dyn RecordStore>,
    extractor: DataExtractor,
}

impl IngestPipeline {
    pub fn new(scorer: RiskScorer, store: Arc<dyn RecordStore>, extractor: DataExtractor) -> Self {
        Self {
            scorer,
            store,
            extractor,
        }
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn process(&self, message: &Message) -> Outcome {
        if message.id.is_blank() {
            log::warn!("Skipping message without an id: '{}'", truncate(&message.subject, 50));
            return Outcome::Failed("missing message id".to_string());
        }

        match self.store.exists(&message.id) {
            Ok(true) => {
                log::debug!("Message {} already processed", message.id);
                return Outcome::DuplicateSkipped;
            }
            Ok(false) => {}
            Err(e) => {
                log::error!("Could not check message {}: {}", message.id, e);
                return Outcome::Failed(e.to_string());
            }
        }

        let verdict = self.scorer.score(message);

        let record_id = match self.store.save(message, &verdict) {
            Ok(record_id) => record_id,
            Err(StoreError::Duplicate(id)) => {
                // Lost a race with another writer; the first save stands.
                log::warn!("Message {id} was stored concurrently, dropping this copy");
                return Outcome::Failed(format!("duplicate message id {id}"));
            }
            Err(e) => {
                log::error!("Failed to store message {}: {}", message.id, e);
                return Outcome::Failed(e.to_string());
            }
        };

        self.enrich(record_id, message);
        log_verdict(message, &verdict);

        Outcome::Persisted { record_id, verdict }
    }

    fn enrich(&self, record_id: RecordId, message: &Message) {
        for (kind, values) in self.extractor.extract_all(&message.body) {
            for value in values {
                if let Err(e) = self.store.save_extracted(record_id, kind, &value) {
                    log::debug!("Could not attach {kind} to {record_id}: {e}");
                }
            }
        }
    }
}

fn log_verdict(message: &Message, verdict: &Verdict) {
    log::info!(
        "{} [{}] {}/100 | {} - {}",
        verdict.risk_level.marker(),
        verdict.risk_level,
        verdict.score,
        truncate(&message.sender_email, 30),
        truncate(&message.subject, 50)
    );

    if verdict.is_flagged {
        let reasons: Vec<&str> = verdict.reasons.iter().take(2).map(String::as_str).collect();
        log::warn!(
            "Suspicious message {} from {}: {}",
            message.id,
            message.sender_email,
            reasons.join("; ")
        );
    }
}

/// Shorten to `max_chars` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
