//! Worker actor
//!
//! A worker waits for a member carrying the master role, registers with it
//! and then runs whatever tasks arrive through its large-message proxy, one
//! at a time. Searches are CPU-bound and run on the blocking pool; hint
//! matches are reported as they are found, completions once the search ends.

use std::time::Duration;

use runtime_core::{PasswordResult, Task, WorkerConfig, WorkerId};
use search::{crack_hints, crack_password};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use transport::{Delivery, LargeMessageProxy};

use crate::protocol::{
    MasterMessage, MasterRef, Member, MembershipEvent, WorkerControl, WorkerHandle, MASTER_ROLE,
};

/// What a finished search reports back
#[derive(Debug)]
enum TaskReport {
    Hints { excluded_char: char, matches: usize },
    Password(PasswordResult),
}

/// Worker actor
pub struct Worker {
    id: WorkerId,
    heartbeat_interval: Duration,
    handle: WorkerHandle,
    control: mpsc::UnboundedReceiver<WorkerControl>,
    tasks: mpsc::UnboundedReceiver<Delivery<Task>>,
    proxy_task: JoinHandle<()>,
    master: Option<(Member, MasterRef)>,
    current: Option<JoinHandle<TaskReport>>,
}

impl Worker {
    /// Start a worker and its proxy
    pub fn spawn(id: impl Into<WorkerId>, config: &WorkerConfig) -> (WorkerHandle, JoinHandle<()>) {
        let id = id.into();
        let (control_tx, control) = mpsc::unbounded_channel();
        let (task_tx, tasks) = mpsc::unbounded_channel();
        let (proxy, proxy_task) = LargeMessageProxy::<Task>::spawn(id.clone(), task_tx);

        let handle = WorkerHandle {
            id: id.clone(),
            proxy,
            control: control_tx,
        };
        let worker = Self {
            id,
            heartbeat_interval: config.heartbeat_interval,
            handle: handle.clone(),
            control,
            tasks,
            proxy_task,
            master: None,
            current: None,
        };
        (handle, tokio::spawn(worker.run()))
    }

    async fn run(mut self) {
        info!(worker_id = %self.id, "Worker started");

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                control = self.control.recv() => match control {
                    Some(WorkerControl::Membership(MembershipEvent::MemberUp(member))) => {
                        self.on_member_up(member);
                    }
                    Some(WorkerControl::Membership(MembershipEvent::MemberRemoved(member))) => {
                        if self.is_master(&member) {
                            info!(worker_id = %self.id, "Master left the cluster");
                            break;
                        }
                    }
                    Some(WorkerControl::Stop) | None => break,
                },
                delivery = self.tasks.recv(), if self.current.is_none() => match delivery {
                    Some(delivery) => self.start(delivery),
                    None => {
                        error!(worker_id = %self.id, "Task proxy stopped");
                        break;
                    }
                },
                report = join_current(&mut self.current), if self.current.is_some() => {
                    self.current = None;
                    if !self.report(report) {
                        break;
                    }
                }
                _ = heartbeat.tick(), if self.master.is_some() => self.heartbeat(),
            }
        }

        self.proxy_task.abort();
        if self.current.is_some() {
            debug!(worker_id = %self.id, "Abandoning running search");
        }
        info!(worker_id = %self.id, "Worker stopped");
    }

    /// Register with the first member that hosts the master
    fn on_member_up(&mut self, member: Member) {
        if self.master.is_some() || !member.has_role(MASTER_ROLE) {
            return;
        }
        let Some(master) = member.master.clone() else {
            warn!(member = %member.address, "Master member without an address");
            return;
        };

        if master.tell(MasterMessage::Registration(self.handle.clone())) {
            info!(worker_id = %self.id, master = %member.address, "Registered with master");
            self.master = Some((member, master));
        }
    }

    fn is_master(&self, member: &Member) -> bool {
        matches!(&self.master, Some((m, _)) if m == member)
    }

    fn heartbeat(&self) {
        if let Some((_, master)) = &self.master {
            master.tell(MasterMessage::Heartbeat {
                worker_id: self.id.clone(),
            });
        }
    }

    fn start(&mut self, delivery: Delivery<Task>) {
        let Some((_, master)) = &self.master else {
            warn!(worker_id = %self.id, sender = %delivery.sender, "Task before registration dropped");
            return;
        };

        info!(worker_id = %self.id, task = %delivery.payload, "Task started");
        let handle = match delivery.payload {
            Task::Hint(task) => {
                let master = master.clone();
                tokio::task::spawn_blocking(move || {
                    let excluded_char = task.excluded_char;
                    let matches = crack_hints(&task, |record_index| {
                        master.tell(MasterMessage::PasswordChar {
                            record_index,
                            excluded_char,
                        });
                    });
                    TaskReport::Hints {
                        excluded_char,
                        matches,
                    }
                })
            }
            Task::Password(task) => tokio::task::spawn_blocking(move || {
                let password = crack_password(&task);
                TaskReport::Password(PasswordResult {
                    record_index: task.record_index,
                    password,
                })
            }),
        };
        self.current = Some(handle);
    }

    /// Report a finished search; false if the worker must stop
    fn report(&self, report: Result<TaskReport, JoinError>) -> bool {
        let Some((_, master)) = &self.master else {
            return false;
        };

        let msg = match report {
            Ok(TaskReport::Hints {
                excluded_char,
                matches,
            }) => {
                info!(worker_id = %self.id, excluded_char = %excluded_char, matches, "Hint task completed");
                MasterMessage::HintsCompleted {
                    worker_id: self.id.clone(),
                    excluded_char,
                }
            }
            Ok(TaskReport::Password(result)) => {
                match &result.password {
                    Some(_) => info!(worker_id = %self.id, result = %result, "Password cracked"),
                    None => warn!(
                        worker_id = %self.id,
                        record_index = result.record_index,
                        "No password found over the reduced alphabet"
                    ),
                }
                MasterMessage::PasswordCompleted {
                    worker_id: self.id.clone(),
                    result,
                }
            }
            Err(e) => {
                error!(worker_id = %self.id, error = %e, "Search task failed");
                return false;
            }
        };

        master.tell(msg)
    }
}

async fn join_current<T>(current: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match current {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
