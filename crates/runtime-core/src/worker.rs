//! Worker state and registry management

use crate::{Error, Result, TaskKind, WorkerId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Worker state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerState {
    /// Worker is idle, ready for work
    Idle,

    /// Worker is searching permutations for hints
    BusyHint,

    /// Worker is searching for a password
    BusyPassword,

    /// Worker is dead (missed heartbeats)
    Dead,
}

impl WorkerState {
    /// Returns true if the worker holds a task
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkerState::BusyHint | WorkerState::BusyPassword)
    }
}

impl From<TaskKind> for WorkerState {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Hint => WorkerState::BusyHint,
            TaskKind::Password => WorkerState::BusyPassword,
        }
    }
}

/// Worker information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// Unique worker identifier
    pub id: WorkerId,

    /// Current state
    pub state: WorkerState,

    /// Last heartbeat timestamp
    pub last_heartbeat: DateTime<Utc>,

    /// Registration timestamp
    pub registered_at: DateTime<Utc>,

    /// Current task description
    pub current_task: String,

    /// Tasks finished by this worker
    pub tasks_completed: u64,
}

impl WorkerInfo {
    /// Create a new worker info
    pub fn new(id: WorkerId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: WorkerState::Idle,
            last_heartbeat: now,
            registered_at: now,
            current_task: String::new(),
            tasks_completed: 0,
        }
    }

    /// Update heartbeat timestamp
    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }

    /// Check if worker is considered dead based on timeout
    pub fn is_dead(&self, timeout: Duration) -> bool {
        self.time_since_heartbeat() > timeout
    }

    /// Get time since last heartbeat
    pub fn time_since_heartbeat(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.last_heartbeat)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Thread-safe worker registry.
///
/// Mirrors the coordinator's scheduling decisions for observers and tracks
/// heartbeats; it never decides anything itself.
pub struct WorkerRegistry {
    /// Map of worker ID to worker info
    workers: DashMap<WorkerId, WorkerInfo>,

    /// Maximum workers allowed
    max_workers: usize,

    /// Heartbeat timeout duration
    heartbeat_timeout: Duration,
}

impl WorkerRegistry {
    /// Create a new worker registry
    pub fn new(max_workers: usize, heartbeat_timeout: Duration) -> Self {
        Self {
            workers: DashMap::new(),
            max_workers,
            heartbeat_timeout,
        }
    }

    /// Register a new worker
    pub fn register(&self, worker_id: &str) -> Result<WorkerInfo> {
        if self.workers.len() >= self.max_workers {
            return Err(Error::WorkerLimitReached {
                max: self.max_workers,
            });
        }

        if self.workers.contains_key(worker_id) {
            return Err(Error::WorkerAlreadyRegistered {
                worker_id: worker_id.to_string(),
            });
        }

        let worker = WorkerInfo::new(worker_id.to_string());
        info!(worker_id = %worker.id, "Worker registered");

        self.workers.insert(worker.id.clone(), worker.clone());
        Ok(worker)
    }

    /// Deregister a worker
    pub fn deregister(&self, worker_id: &str) -> Result<WorkerInfo> {
        self.workers
            .remove(worker_id)
            .map(|(_, w)| {
                info!(worker_id = %worker_id, "Worker deregistered");
                w
            })
            .ok_or_else(|| Error::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })
    }

    /// Get worker info by ID
    pub fn get(&self, worker_id: &str) -> Option<WorkerInfo> {
        self.workers.get(worker_id).map(|w| w.clone())
    }

    /// Update worker heartbeat
    pub fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let mut worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| Error::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;

        worker.heartbeat();
        Ok(())
    }

    /// Record that a task was handed to the worker
    pub fn assign(&self, worker_id: &str, kind: TaskKind, task: String) -> Result<()> {
        let mut worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| Error::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;

        worker.state = WorkerState::from(kind);
        worker.current_task = task;
        Ok(())
    }

    /// Record that the worker finished its task and is idle
    pub fn complete(&self, worker_id: &str) -> Result<()> {
        let mut worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| Error::WorkerNotFound {
                worker_id: worker_id.to_string(),
            })?;

        worker.state = WorkerState::Idle;
        worker.current_task.clear();
        worker.tasks_completed += 1;
        Ok(())
    }

    /// Get all workers
    pub fn all_workers(&self) -> Vec<WorkerInfo> {
        self.workers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered workers
    pub fn world_size(&self) -> usize {
        self.workers.len()
    }

    /// Check for dead workers and mark them
    pub fn check_dead_workers(&self) -> Vec<WorkerId> {
        let mut dead_workers = Vec::new();

        for mut entry in self.workers.iter_mut() {
            if entry.value().is_dead(self.heartbeat_timeout)
                && entry.value().state != WorkerState::Dead
            {
                warn!(
                    worker_id = %entry.key(),
                    last_heartbeat = ?entry.value().last_heartbeat,
                    "Worker marked as dead"
                );
                entry.value_mut().state = WorkerState::Dead;
                dead_workers.push(entry.key().clone());
            }
        }

        dead_workers
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new(10000, Duration::from_secs(30))
    }
}

/// Thread-safe handle to worker registry
pub type WorkerRegistryHandle = Arc<WorkerRegistry>;
