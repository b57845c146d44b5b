use crate::config::Config;
use crate::error::SourceError;
use crate::pipeline::{IngestPipeline, Outcome};
use crate::source::MessageSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Counters kept across every sweep of one scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    /// Messages newly persisted; duplicates are not counted again.
    pub total_checked: u64,
    pub flagged_count: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub available: usize,
    pub persisted: usize,
    pub flagged: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub unreadable: usize,
}

/// Cloneable handle that asks a running scheduler to stop after its current
/// sweep. Stopping twice is a no-op.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.tx.send_replace(true) {
            log::info!("Stop requested, finishing current sweep");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct Scheduler {
    pipeline: IngestPipeline,
    source: Box<dyn MessageSource>,
    interval: Duration,
    failure_backoff: Duration,
    max_messages: usize,
    stats: RunStats,
    state: SchedulerState,
    stop: StopHandle,
    stop_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(config: &Config, pipeline: IngestPipeline, source: Box<dyn MessageSource>) -> Self {
        let (tx, stop_rx) = watch::channel(false);
        Self {
            pipeline,
            source,
            interval: config.interval(),
            failure_backoff: config.failure_backoff(),
            max_messages: config.max_messages_per_sweep,
            stats: RunStats::default(),
            state: SchedulerState::Idle,
            stop: StopHandle { tx: Arc::new(tx) },
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> SchedulerState {
        match self.state {
            SchedulerState::Running => SchedulerState::Running,
            _ if self.stop.is_stopped() => SchedulerState::Stopped,
            state => state,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Sweep immediately, then every interval until stopped.
    ///
    /// A stop request is seen as soon as it is made; a sweep already under way
    /// always runs to completion first. A sweep that cannot reach the source
    /// waits an extra backoff before the next attempt.
    pub async fn start(&mut self) {
        if self.state() == SchedulerState::Stopped {
            log::info!("Scheduler already stopped, not starting");
            return;
        }

        self.stats.started_at = Some(Utc::now());
        log::info!(
            "Starting continuous monitoring: every {}s, up to {} messages per sweep",
            self.interval.as_secs(),
            self.max_messages
        );

        let mut wait = self.tick();
        while !self.stop.is_stopped() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            if self.stop.is_stopped() {
                break;
            }
            wait = self.tick();
        }

        self.state = SchedulerState::Stopped;
        log::info!(
            "Monitoring stopped: {} checked, {} flagged",
            self.stats.total_checked,
            self.stats.flagged_count
        );
    }

    /// Run a sweep and pick the delay before the next one.
    fn tick(&mut self) -> Duration {
        match self.run_once() {
            Ok(_) => self.interval,
            Err(e) => {
                let wait = self.interval.saturating_add(self.failure_backoff);
                log::error!("Sweep failed: {}; retrying in {}s", e, wait.as_secs());
                wait
            }
        }
    }

    /// One pass over the newest messages in the source.
    pub fn run_once(&mut self) -> Result<SweepReport, SourceError> {
        self.state = SchedulerState::Running;
        let result = self.sweep();
        self.state = SchedulerState::Idle;
        result
    }

    fn sweep(&mut self) -> Result<SweepReport, SourceError> {
        log::info!("Checking for new messages...");
        let mut report = SweepReport {
            available: self.source.count()?,
            ..Default::default()
        };

        if report.available == 0 {
            log::info!("No messages in source");
        }

        let batch = report.available.min(self.max_messages);
        for index in 0..batch {
            let message = match self.source.read(index) {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("Skipping message at index {index}: {e}");
                    report.unreadable += 1;
                    continue;
                }
            };

            match self.pipeline.process(&message) {
                Outcome::Persisted { verdict, .. } => {
                    report.persisted += 1;
                    self.stats.total_checked += 1;
                    if verdict.is_flagged {
                        report.flagged += 1;
                    }
                }
                Outcome::DuplicateSkipped => report.duplicates += 1,
                Outcome::Failed(reason) => {
                    log::debug!("Message at index {index} not stored: {reason}");
                    report.failed += 1;
                }
            }
        }

        self.stats.flagged_count += report.flagged as u64;
        self.stats.last_check_at = Some(Utc::now());

        log::info!(
            "Sweep done: {} new, {} flagged, {} already seen, {} failed, {} unreadable",
            report.persisted,
            report.flagged,
            report.duplicates,
            report.failed,
            report.unreadable
        );
        if report.flagged > 0 {
            log::warn!("{} suspicious message(s) in this sweep", report.flagged);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DataExtractor;
    use crate::message::Message;
    use crate::scorer::RiskScorer;
    use crate::source::SpoolSource;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    struct FakeSource {
        messages: Vec<Message>,
        unreadable: Option<usize>,
        unavailable: bool,
        count_calls: Arc<AtomicUsize>,
        stop_on_count: Option<StopHandle>,
    }

    impl FakeSource {
        fn with_messages(n: usize) -> Self {
            Self {
                messages: (0..n)
                    .map(|i| {
                        Message::new(format!("msg-{i}"))
                            .with_sender("Loja", "ofertas@loja.com.br")
                            .with_subject("Novidades da semana")
                    })
                    .collect(),
                unreadable: None,
                unavailable: false,
                count_calls: Arc::new(AtomicUsize::new(0)),
                stop_on_count: None,
            }
        }
    }

    impl MessageSource for FakeSource {
        fn count(&mut self) -> Result<usize, SourceError> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = &self.stop_on_count {
                handle.stop();
            }
            if self.unavailable {
                return Err(SourceError::Unavailable("mailbox offline".to_string()));
            }
            Ok(self.messages.len())
        }

        fn read(&mut self, index: usize) -> Result<Message, SourceError> {
            if self.unreadable == Some(index) {
                return Err(SourceError::Malformed {
                    index,
                    reason: "truncated".to_string(),
                });
            }
            self.messages
                .get(index)
                .cloned()
                .ok_or(SourceError::NotFound(index))
        }
    }

    fn config(max_messages: usize) -> Config {
        Config {
            interval_minutes: 1,
            max_messages_per_sweep: max_messages,
            failure_backoff_seconds: 120,
            ..Default::default()
        }
    }

    fn scheduler(config: &Config, source: FakeSource) -> Scheduler {
        let pipeline = IngestPipeline::new(
            RiskScorer::with_trusted_domains(&[]).unwrap(),
            Arc::new(MemoryStore::new()),
            DataExtractor::new().unwrap(),
        );
        Scheduler::new(config, pipeline, Box::new(source))
    }

    #[test]
    fn test_unreadable_message_is_skipped() {
        let mut source = FakeSource::with_messages(10);
        source.unreadable = Some(3);
        let mut scheduler = scheduler(&config(10), source);

        let report = scheduler.run_once().unwrap();
        assert_eq!(report.available, 10);
        assert_eq!(report.persisted, 9);
        assert_eq!(report.unreadable, 1);
        assert_eq!(scheduler.stats().total_checked, 9);
        assert!(scheduler.stats().last_check_at.is_some());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_batch_is_capped() {
        let mut scheduler = scheduler(&config(4), FakeSource::with_messages(10));
        let report = scheduler.run_once().unwrap();
        assert_eq!(report.persisted, 4);
    }

    #[test]
    fn test_spool_arrival_after_full_window_is_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let write = |n: usize| {
            let message = Message::new(format!("spool-{n:03}"))
                .with_sender("Loja", "ofertas@loja.com.br")
                .with_subject("Novidades");
            std::fs::write(
                dir.path().join(format!("{n:03}.json")),
                serde_json::to_string(&message).unwrap(),
            )
            .unwrap();
        };
        for n in 1..=12 {
            write(n);
        }

        let pipeline = IngestPipeline::new(
            RiskScorer::with_trusted_domains(&[]).unwrap(),
            Arc::new(MemoryStore::new()),
            DataExtractor::new().unwrap(),
        );
        let mut scheduler = Scheduler::new(
            &config(10),
            pipeline,
            Box::new(SpoolSource::new(dir.path())),
        );

        assert_eq!(scheduler.run_once().unwrap().persisted, 10);

        write(13);
        let report = scheduler.run_once().unwrap();
        assert_eq!(report.available, 13);
        assert_eq!(report.persisted, 1);
        assert_eq!(report.duplicates, 9);
        assert!(scheduler
            .pipeline()
            .store()
            .exists(&crate::message::MessageId::new("spool-013"))
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_does_not_overflow_backoff() {
        let mut source = FakeSource::with_messages(1);
        source.unavailable = true;
        let calls = source.count_calls.clone();
        let config = Config {
            interval_minutes: u64::MAX,
            ..config(10)
        };
        let mut scheduler = scheduler(&config, source);
        let handle = scheduler.stop_handle();

        tokio::join!(scheduler.start(), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.stop();
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_repeated_sweeps_count_each_message_once() {
        let mut scheduler = scheduler(&config(10), FakeSource::with_messages(5));

        scheduler.run_once().unwrap();
        let second = scheduler.run_once().unwrap();
        assert_eq!(second.persisted, 0);
        assert_eq!(second.duplicates, 5);
        assert_eq!(scheduler.stats().total_checked, 5);
        assert_eq!(scheduler.pipeline().store().stats().unwrap().total, 5);
    }

    #[test]
    fn test_unavailable_source_fails_sweep() {
        let mut source = FakeSource::with_messages(3);
        source.unavailable = true;
        let mut scheduler = scheduler(&config(10), source);

        assert!(matches!(
            scheduler.run_once(),
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(scheduler.stats().last_check_at, None);
    }

    #[tokio::test]
    async fn test_stop_before_start_does_not_sweep() {
        let source = FakeSource::with_messages(3);
        let calls = source.count_calls.clone();
        let mut scheduler = scheduler(&config(10), source);

        scheduler.stop();
        scheduler.stop();
        scheduler.start().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.stats().started_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_sweep_finishes_that_sweep() {
        let mut source = FakeSource::with_messages(3);
        let calls = source.count_calls.clone();
        let mut scheduler = scheduler(&config(10), FakeSource::with_messages(0));
        source.stop_on_count = Some(scheduler.stop_handle());
        scheduler.source = Box::new(source);

        scheduler.start().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().total_checked, 3);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval_until_stopped() {
        let source = FakeSource::with_messages(2);
        let calls = source.count_calls.clone();
        let mut scheduler = scheduler(&config(10), source);
        let handle = scheduler.stop_handle();
        let began = Instant::now();

        tokio::join!(scheduler.start(), async {
            tokio::time::sleep(Duration::from_secs(150)).await;
            handle.stop();
        });

        // t = 0, 60, 120; the stop at 150 cuts the wait for 180 short.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(began.elapsed() < Duration::from_secs(180));
        assert_eq!(scheduler.stats().total_checked, 2);
        assert!(scheduler.stats().started_at.is_some());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sweep_backs_off() {
        let mut source = FakeSource::with_messages(2);
        source.unavailable = true;
        let calls = source.count_calls.clone();
        let mut scheduler = scheduler(&config(10), source);
        let handle = scheduler.stop_handle();

        tokio::join!(scheduler.start(), async {
            tokio::time::sleep(Duration::from_secs(200)).await;
            handle.stop();
        });

        // t = 0 and t = 180 (60s interval + 120s backoff).
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
