//! Master actor
//!
//! The master drives the run: it requests batches from the reader, feeds them
//! into the [`Scheduler`], transmits the resulting assignments to workers
//! through their large-message proxies, forwards password results to the
//! collector and finalizes once both phases have drained.
//!
//! Worker loss is detected two ways: a watch on each worker's control
//! channel fires when the worker stops, and the registry reports workers
//! whose heartbeats lapsed.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use runtime_core::{
    Error, PasswordResult, RecordIndex, Result, RuntimeConfig, WorkerId, WorkerRegistryHandle,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use transport::Transmitter;

use crate::collector::CollectorRef;
use crate::protocol::{Batch, MasterInbox, MasterMessage, MasterRef, WorkerHandle, MASTER_ENDPOINT};
use crate::reader::ReaderRef;
use crate::scheduler::{Assignment, CoordinatorStatus, Scheduler};

/// Master actor
pub struct Master {
    config: RuntimeConfig,
    scheduler: Scheduler,
    registry: WorkerRegistryHandle,
    workers: HashMap<WorkerId, WorkerHandle>,
    watches: HashMap<WorkerId, JoinHandle<()>>,
    transmitter: Transmitter,
    reader: ReaderRef,
    collector: CollectorRef,
    inbox: MasterInbox,
    self_ref: MasterRef,
    started: Option<(Instant, DateTime<Utc>)>,
    running: bool,
}

impl Master {
    /// Create a master reading from `inbox`, addressed by `self_ref`
    pub fn new(
        config: RuntimeConfig,
        registry: WorkerRegistryHandle,
        (self_ref, inbox): (MasterRef, MasterInbox),
        reader: ReaderRef,
        collector: CollectorRef,
    ) -> Result<Self> {
        config.validate()?;
        let transmitter = Transmitter::new(MASTER_ENDPOINT, config.transport.fragment_size)?;

        Ok(Self {
            config,
            scheduler: Scheduler::new(),
            registry,
            workers: HashMap::new(),
            watches: HashMap::new(),
            transmitter,
            reader,
            collector,
            inbox,
            self_ref,
            started: None,
            running: true,
        })
    }

    /// Main loop, returns once the run is finalized
    pub async fn run(mut self) {
        info!("Master started");

        let mut dead_check = tokio::time::interval(self.config.coordinator.dead_worker_check_interval);
        dead_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.running {
            tokio::select! {
                msg = self.inbox.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                _ = dead_check.tick() => self.check_dead_workers(),
            }
        }

        info!("Master stopped");
    }

    fn handle(&mut self, msg: MasterMessage) {
        match msg {
            MasterMessage::Start => self.on_start(),
            MasterMessage::Batch(lines) => self.on_batch(lines),
            MasterMessage::BatchRejected { error } => self.on_batch_rejected(error),
            MasterMessage::Registration(handle) => self.on_registration(handle),
            MasterMessage::PasswordChar {
                record_index,
                excluded_char,
            } => self.on_password_char(record_index, excluded_char),
            MasterMessage::HintsCompleted {
                worker_id,
                excluded_char,
            } => self.on_hints_completed(worker_id, excluded_char),
            MasterMessage::PasswordCompleted { worker_id, result } => {
                self.on_password_completed(worker_id, result)
            }
            MasterMessage::Heartbeat { worker_id } => {
                if let Err(e) = self.registry.heartbeat(&worker_id) {
                    debug!(worker_id = %worker_id, error = %e, "Heartbeat ignored");
                }
            }
            MasterMessage::WorkerLost { worker_id } => self.lose_worker(&worker_id),
            MasterMessage::Status(reply) => {
                let _ = reply.send(self.status());
            }
            MasterMessage::Shutdown => {
                warn!("Shutdown requested, finishing early");
                if self.scheduler.mark_finalized() {
                    self.collector.print();
                }
                self.terminate();
            }
        }
    }

    fn on_start(&mut self) {
        if self.started.is_some() {
            warn!("Duplicate start ignored");
            return;
        }
        info!("Run started");
        self.started = Some((Instant::now(), Utc::now()));
        self.reader.read();
    }

    #[instrument(skip_all, fields(lines = lines.len()))]
    fn on_batch(&mut self, lines: Batch) {
        if lines.is_empty() {
            self.collector.progress("Input exhausted");
            let assignments = self.scheduler.end_of_input();
            self.execute(assignments);
            self.check_termination();
            return;
        }

        let size = lines.len();
        match self.scheduler.ingest_batch(&lines) {
            Ok(outcome) => {
                self.collector
                    .progress(format!("Processed batch of size {}", size));
                self.execute(outcome.assignments);
            }
            Err(Error::InputClosed) => {
                warn!("Batch after end of input dropped");
                return;
            }
            Err(e) => {
                error!(error = %e, "Batch rejected");
                self.collector.progress(format!("Rejected batch of size {}: {}", size, e));
            }
        }
        self.reader.read();
    }

    fn on_batch_rejected(&mut self, error: Error) {
        error!(error = %error, "Unreadable batch rejected");
        self.collector.progress(format!("Rejected batch: {}", error));
        self.reader.read();
    }

    fn on_registration(&mut self, handle: WorkerHandle) {
        if let Err(e) = self.registry.register(&handle.id) {
            warn!(worker_id = %handle.id, error = %e, "Registration refused");
            if !matches!(e, Error::WorkerAlreadyRegistered { .. }) {
                handle.stop();
            }
            return;
        }

        match self.scheduler.register(&handle.id) {
            Ok(assignments) => {
                self.watch(&handle);
                self.workers.insert(handle.id.clone(), handle);
                self.execute(assignments);
            }
            Err(e) => {
                warn!(worker_id = %handle.id, error = %e, "Registration refused");
            }
        }
    }

    fn on_password_char(&mut self, record_index: RecordIndex, excluded_char: char) {
        match self.scheduler.eliminate(record_index, excluded_char) {
            Ok(true) => debug!(record_index, excluded_char = %excluded_char, "Character eliminated"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Elimination ignored"),
        }
    }

    fn on_hints_completed(&mut self, worker_id: WorkerId, excluded_char: char) {
        let Some(assignments) = self.scheduler.hints_completed(&worker_id) else {
            return;
        };
        debug!(worker_id = %worker_id, excluded_char = %excluded_char, "Hint task done");
        let _ = self.registry.complete(&worker_id);
        self.execute(assignments);
        self.check_termination();
    }

    fn on_password_completed(&mut self, worker_id: WorkerId, result: PasswordResult) {
        let Some(assignments) = self.scheduler.password_completed(&worker_id) else {
            warn!(worker_id = %worker_id, result = %result, "Stale password result dropped");
            return;
        };
        self.collector.collect(result.to_string());
        let _ = self.registry.complete(&worker_id);
        self.execute(assignments);
        self.check_termination();
    }

    /// Transmit assignments; a failed delivery counts as losing the worker
    fn execute(&mut self, assignments: Vec<Assignment>) {
        for Assignment { worker_id, task } in assignments {
            let Some(handle) = self.workers.get(&worker_id) else {
                error!(worker_id = %worker_id, task = %task, "Assignment to unknown worker");
                continue;
            };

            let _ = self
                .registry
                .assign(&worker_id, task.kind(), task.to_string());

            match self.transmitter.send(&task, &handle.proxy) {
                Ok(fragments) => {
                    debug!(worker_id = %worker_id, task = %task, fragments, "Task sent");
                }
                Err(e) => {
                    warn!(worker_id = %worker_id, error = %e, "Task delivery failed, treating worker as lost");
                    self.self_ref.tell(MasterMessage::WorkerLost { worker_id });
                }
            }
        }
    }

    /// Report `WorkerLost` once the worker's control channel closes
    fn watch(&mut self, handle: &WorkerHandle) {
        let control = handle.control.clone();
        let master = self.self_ref.clone();
        let worker_id = handle.id.clone();

        let watch = tokio::spawn(async move {
            control.closed().await;
            master.tell(MasterMessage::WorkerLost { worker_id });
        });
        if let Some(previous) = self.watches.insert(handle.id.clone(), watch) {
            previous.abort();
        }
    }

    fn lose_worker(&mut self, worker_id: &str) {
        if let Some(watch) = self.watches.remove(worker_id) {
            watch.abort();
        }
        let Some(handle) = self.workers.remove(worker_id) else {
            return;
        };
        // Heartbeat loss may leave the worker running
        handle.stop();
        let _ = self.registry.deregister(worker_id);

        warn!(worker_id, "Worker lost");
        let assignments = self.scheduler.worker_lost(worker_id);
        self.execute(assignments);
    }

    fn check_dead_workers(&mut self) {
        for worker_id in self.registry.check_dead_workers() {
            let last_seen_ms = self
                .registry
                .get(&worker_id)
                .map(|w| w.time_since_heartbeat().as_millis() as u64)
                .unwrap_or(0);
            let err = Error::WorkerHeartbeatTimeout {
                worker_id: worker_id.clone(),
                last_seen_ms,
            };
            warn!(error = %err, "Heartbeat lost");
            self.lose_worker(&worker_id);
        }
    }

    fn check_termination(&mut self) {
        if self.scheduler.take_finalize() {
            self.collector.print();
            self.terminate();
        }
    }

    /// Stop every collaborator exactly once
    fn terminate(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        for (_, watch) in self.watches.drain() {
            watch.abort();
        }
        for (worker_id, handle) in self.workers.drain() {
            debug!(worker_id = %worker_id, "Stopping worker");
            handle.stop();
        }
        self.reader.stop();
        self.collector.stop();

        let elapsed_ms = self
            .started
            .map(|(instant, _)| instant.elapsed().as_millis() as u64)
            .unwrap_or(0);
        info!(elapsed_ms, "Algorithm finished");
    }

    fn status(&self) -> CoordinatorStatus {
        let mut status = self.scheduler.snapshot();
        status.registered_workers = self.registry.world_size();
        if let Some((instant, at)) = self.started {
            status.started_at = Some(at);
            status.elapsed_ms = instant.elapsed().as_millis() as u64;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::reader::{Reader, VecBatchSource};
    use runtime_core::WorkerRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_input_finalizes_and_stops() {
        let master_channel = MasterRef::channel();
        let master_ref = master_channel.0.clone();
        let (collector, collector_task) = Collector::spawn();
        let (reader, reader_task) = Reader::spawn(VecBatchSource::new(Vec::new(), 10), master_ref.clone());

        let master = Master::new(
            RuntimeConfig::default(),
            Arc::new(WorkerRegistry::default()),
            master_channel,
            reader,
            collector,
        )
        .unwrap();
        let master_task = tokio::spawn(master.run());

        master_ref.tell(MasterMessage::Start);
        tokio::time::timeout(Duration::from_secs(5), master_task)
            .await
            .unwrap()
            .unwrap();

        reader_task.await.unwrap();
        let report = collector_task.await.unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.prints, 1);
        assert_eq!(report.progress, vec!["Input exhausted"]);
    }

    /// Fails to decode its first batch, then reports end of input
    struct UndecodableFirstBatch(bool);

    impl crate::reader::BatchSource for UndecodableFirstBatch {
        fn next_batch(&mut self) -> Result<Batch> {
            if std::mem::replace(&mut self.0, true) {
                Ok(Batch::new())
            } else {
                Err(Error::malformed(1, "invalid UTF-8"))
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_batch_requests_next() {
        let master_channel = MasterRef::channel();
        let master_ref = master_channel.0.clone();
        let (collector, collector_task) = Collector::spawn();
        let (reader, _) = Reader::spawn(UndecodableFirstBatch(false), master_ref.clone());

        let master = Master::new(
            RuntimeConfig::default(),
            Arc::new(WorkerRegistry::default()),
            master_channel,
            reader,
            collector,
        )
        .unwrap();
        let master_task = tokio::spawn(master.run());

        master_ref.tell(MasterMessage::Start);
        tokio::time::timeout(Duration::from_secs(5), master_task)
            .await
            .unwrap()
            .unwrap();

        let report = collector_task.await.unwrap();
        assert_eq!(
            report.progress,
            vec![
                "Rejected batch: Malformed batch at line 1: invalid UTF-8",
                "Input exhausted"
            ]
        );
        assert_eq!(report.prints, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = RuntimeConfig::default();
        config.transport.fragment_size = 0;

        let channel = MasterRef::channel();
        let (collector, _) = Collector::spawn();
        let (reader, _) = Reader::spawn(VecBatchSource::new(Vec::new(), 1), channel.0.clone());

        let result = Master::new(
            config,
            Arc::new(WorkerRegistry::default()),
            channel,
            reader,
            collector,
        );
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_status_reports_phase() {
        let channel = MasterRef::channel();
        let master_ref = channel.0.clone();
        let (collector, _) = Collector::spawn();
        let (reader, _) = Reader::spawn(
            VecBatchSource::from_text("1;Alice;AB;1;00", 10),
            master_ref.clone(),
        );
        let master = Master::new(
            RuntimeConfig::default(),
            Arc::new(WorkerRegistry::default()),
            channel,
            reader,
            collector,
        )
        .unwrap();
        tokio::spawn(master.run());

        let status = master_ref.status().await.unwrap();
        assert_eq!(status.phase, crate::scheduler::Phase::Hints);
        assert!(status.started_at.is_none());

        master_ref.tell(MasterMessage::Start);
        let mut status = master_ref.status().await.unwrap();
        for _ in 0..50 {
            if status.input_exhausted {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = master_ref.status().await.unwrap();
        }
        assert!(status.input_exhausted);
        assert_eq!(status.records, 1);
        assert_eq!(status.pending_hint_tasks, 2);
        assert!(status.started_at.is_some());

        master_ref.tell(MasterMessage::Shutdown);
    }
}
