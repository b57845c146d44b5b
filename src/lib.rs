pub mod config;
pub mod domain_utils;
pub mod error;
pub mod extract;
pub mod features;
pub mod message;
pub mod pipeline;
pub mod scheduler;
pub mod scorer;
pub mod source;
pub mod store;

pub use config::{Config, RunMode};
pub use error::{ConfigError, SourceError, StoreError};
pub use extract::{DataExtractor, DataKind};
pub use message::{Message, MessageId};
pub use pipeline::{IngestPipeline, Outcome};
pub use scheduler::{RunStats, Scheduler, SchedulerState, StopHandle, SweepReport};
pub use scorer::{RiskLevel, RiskScorer, Verdict};
pub use source::{MessageSource, SpoolSource};
pub use store::{MemoryStore, RecordId, RecordStore, SqliteStore};
