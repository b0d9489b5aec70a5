//! In-process cluster: one master, its reader and collector, and workers
//!
//! `LocalCluster` plays the membership layer. Every worker it spawns, at
//! start or later, receives `MemberUp` for the master member and registers
//! itself; killing a worker aborts its task, which the master observes
//! through its watch.

use std::collections::HashMap;
use std::sync::Arc;

use runtime_core::{
    Error, Result, RuntimeConfig, WorkerId, WorkerRegistry, WorkerRegistryHandle,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collector::{Collector, CollectorReport};
use crate::master::Master;
use crate::protocol::{MasterMessage, MasterRef, Member, MembershipEvent, WorkerHandle};
use crate::reader::{BatchSource, Reader};
use crate::worker::Worker;

struct WorkerSlot {
    handle: WorkerHandle,
    task: JoinHandle<()>,
}

/// A running cluster
pub struct LocalCluster {
    config: RuntimeConfig,
    master: MasterRef,
    master_member: Member,
    registry: WorkerRegistryHandle,
    workers: HashMap<WorkerId, WorkerSlot>,
    master_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
    collector_task: JoinHandle<CollectorReport>,
}

impl LocalCluster {
    /// Start the actors and `config.worker.local_workers` workers, then
    /// begin reading. Must be called within a Tokio runtime.
    pub fn start(config: RuntimeConfig, source: impl BatchSource) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(WorkerRegistry::new(
            config.coordinator.max_workers,
            config.coordinator.heartbeat_timeout,
        ));
        let (master, inbox) = MasterRef::channel();
        let (collector, collector_task) = Collector::spawn();
        let (reader, reader_task) = Reader::spawn(source, master.clone());

        let actor = Master::new(
            config.clone(),
            registry.clone(),
            (master.clone(), inbox),
            reader,
            collector,
        )?;
        let master_task = tokio::spawn(actor.run());

        let mut cluster = Self {
            master_member: Member::master(format!("cluster@{}/master", Uuid::new_v4()), master.clone()),
            config,
            master,
            registry,
            workers: HashMap::new(),
            master_task,
            reader_task,
            collector_task,
        };

        for _ in 0..cluster.config.worker.local_workers {
            cluster.spawn_worker();
        }

        info!(workers = cluster.workers.len(), "Local cluster started");
        cluster.master.tell(MasterMessage::Start);
        Ok(cluster)
    }

    /// Start one more worker; it joins whatever phase the run is in
    pub fn spawn_worker(&mut self) -> WorkerId {
        let id = format!("worker-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let (handle, task) = Worker::spawn(id.clone(), &self.config.worker);
        handle.notify(MembershipEvent::MemberUp(self.master_member.clone()));

        self.workers.insert(id.clone(), WorkerSlot { handle, task });
        id
    }

    /// Abort a worker as if its host crashed
    pub fn kill_worker(&mut self, worker_id: &str) -> bool {
        match self.workers.remove(worker_id) {
            Some(slot) => {
                warn!(worker_id, "Killing worker");
                slot.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn master(&self) -> &MasterRef {
        &self.master
    }

    pub fn registry(&self) -> WorkerRegistryHandle {
        self.registry.clone()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.keys().cloned().collect()
    }

    /// Wait for the run to finish and return what the collector gathered
    pub async fn wait(self) -> Result<CollectorReport> {
        self.master_task.await.map_err(|e| Error::Internal {
            message: format!("master task failed: {}", e),
        })?;

        for (_, slot) in self.workers {
            slot.handle
                .notify(MembershipEvent::MemberRemoved(self.master_member.clone()));
            let _ = slot.task.await;
        }
        let _ = self.reader_task.await;

        let report = self.collector_task.await.map_err(|e| Error::Internal {
            message: format!("collector task failed: {}", e),
        })?;
        info!(results = report.results.len(), "Local cluster stopped");
        Ok(report)
    }
}
