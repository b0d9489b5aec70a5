//! Master behavior under worker failure, driven by hand-operated workers

use anyhow::{bail, Result};
use coordinator::{
    Collector, CollectorReport, Master, MasterMessage, MasterRef, Phase, Reader, VecBatchSource,
    WorkerControl, WorkerHandle,
};
use runtime_core::{PasswordResult, RuntimeConfig, Task, WorkerRegistry};
use search::sha256_hex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use transport::{Delivery, LargeMessageProxy};

const WAIT: Duration = Duration::from_secs(5);

/// A worker whose every step is performed by the test
struct FakeWorker {
    handle: WorkerHandle,
    control: mpsc::UnboundedReceiver<WorkerControl>,
    tasks: mpsc::UnboundedReceiver<Delivery<Task>>,
}

impl FakeWorker {
    fn new(id: &str) -> Self {
        let (task_tx, tasks) = mpsc::unbounded_channel();
        let (proxy, _) = LargeMessageProxy::<Task>::spawn(id, task_tx);
        let (control_tx, control) = mpsc::unbounded_channel();
        Self {
            handle: WorkerHandle {
                id: id.to_string(),
                proxy,
                control: control_tx,
            },
            control,
            tasks,
        }
    }

    fn id(&self) -> String {
        self.handle.id.clone()
    }

    async fn next_task(&mut self) -> Result<Task> {
        match timeout(WAIT, self.tasks.recv()).await? {
            Some(delivery) => Ok(delivery.payload),
            None => bail!("task proxy of {} stopped", self.handle.id),
        }
    }

    async fn next_control(&mut self) -> Result<WorkerControl> {
        match timeout(WAIT, self.control.recv()).await? {
            Some(control) => Ok(control),
            None => bail!("control channel of {} closed", self.handle.id),
        }
    }

    /// Simulate a crash: the control channel closes
    fn crash(self) {
        drop(self);
    }
}

struct Harness {
    master: MasterRef,
    master_task: JoinHandle<()>,
    collector_task: JoinHandle<CollectorReport>,
}

impl Harness {
    fn start(config: RuntimeConfig, input: &str) -> Result<Self> {
        let (master, inbox) = MasterRef::channel();
        let (collector, collector_task) = Collector::spawn();
        let (reader, _) = Reader::spawn(VecBatchSource::from_text(input, 10), master.clone());
        let registry = Arc::new(WorkerRegistry::new(
            config.coordinator.max_workers,
            config.coordinator.heartbeat_timeout,
        ));

        let actor = Master::new(config, registry, (master.clone(), inbox), reader, collector)?;
        let master_task = tokio::spawn(actor.run());
        Ok(Self {
            master,
            master_task,
            collector_task,
        })
    }

    fn register(&self, worker: &FakeWorker) {
        self.master
            .tell(MasterMessage::Registration(worker.handle.clone()));
    }

    async fn finish(self) -> Result<CollectorReport> {
        timeout(WAIT, self.master_task).await??;
        Ok(timeout(WAIT, self.collector_task).await??)
    }
}

fn config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.worker.heartbeat_interval = Duration::from_millis(50);
    config.coordinator.heartbeat_timeout = Duration::from_millis(300);
    config.coordinator.dead_worker_check_interval = Duration::from_millis(50);
    config
}

fn input() -> String {
    format!("1;Alice;A;1;{}", sha256_hex("A"))
}

#[tokio::test]
async fn test_crashed_worker_task_moves_to_survivor() -> Result<()> {
    let harness = Harness::start(RuntimeConfig::default(), &input())?;
    let mut first = FakeWorker::new("fake-1");
    let mut second = FakeWorker::new("fake-2");

    harness.register(&first);
    harness.master.tell(MasterMessage::Start);

    let Task::Hint(hint) = first.next_task().await? else {
        bail!("expected a hint task");
    };
    assert_eq!(hint.excluded_char, 'A');

    harness.register(&second);
    let first_id = first.id();
    first.crash();

    // The requeued hint task goes to the survivor
    let Task::Hint(requeued) = second.next_task().await? else {
        bail!("expected the requeued hint task");
    };
    assert_eq!(requeued, hint);

    // Events from the crashed worker no longer count
    harness.master.tell(MasterMessage::HintsCompleted {
        worker_id: first_id.clone(),
        excluded_char: 'A',
    });
    let status = harness.master.status().await?;
    assert_eq!(status.phase, Phase::Hints);
    assert_eq!(status.busy_hint_workers, 1);

    harness.master.tell(MasterMessage::HintsCompleted {
        worker_id: second.id(),
        excluded_char: 'A',
    });
    let Task::Password(task) = second.next_task().await? else {
        bail!("expected a password task");
    };
    assert_eq!(task.record_index, 1);
    assert_eq!(task.alphabet, "A");

    // A stale result from the crashed worker is dropped
    harness.master.tell(MasterMessage::PasswordCompleted {
        worker_id: first_id,
        result: PasswordResult {
            record_index: 1,
            password: Some("stale".to_string()),
        },
    });
    harness.master.tell(MasterMessage::PasswordCompleted {
        worker_id: second.id(),
        result: PasswordResult {
            record_index: 1,
            password: Some("A".to_string()),
        },
    });

    assert!(matches!(second.next_control().await?, WorkerControl::Stop));
    let report = harness.finish().await?;
    assert_eq!(report.results, vec!["1: A"]);
    assert_eq!(report.prints, 1);
    Ok(())
}

#[tokio::test]
async fn test_silent_worker_is_declared_dead() -> Result<()> {
    let harness = Harness::start(config(), &input())?;
    let mut silent = FakeWorker::new("fake-silent");
    let mut alive = FakeWorker::new("fake-alive");

    harness.register(&silent);
    harness.master.tell(MasterMessage::Start);
    let hint = silent.next_task().await?;

    harness.register(&alive);
    let master = harness.master.clone();
    let alive_id = alive.id();
    let heartbeats = tokio::spawn(async move {
        loop {
            if !master.tell(MasterMessage::Heartbeat {
                worker_id: alive_id.clone(),
            }) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    // The silent worker is told to stop and its task reassigned
    assert!(matches!(silent.next_control().await?, WorkerControl::Stop));
    assert_eq!(alive.next_task().await?, hint);

    harness.master.tell(MasterMessage::HintsCompleted {
        worker_id: alive.id(),
        excluded_char: 'A',
    });
    let Task::Password(_) = alive.next_task().await? else {
        bail!("expected a password task");
    };
    harness.master.tell(MasterMessage::PasswordCompleted {
        worker_id: alive.id(),
        result: PasswordResult {
            record_index: 1,
            password: None,
        },
    });

    let report = harness.finish().await?;
    heartbeats.await?;
    assert_eq!(report.results, vec!["1: <not found>"]);
    Ok(())
}

#[tokio::test]
async fn test_eliminations_from_lost_workers_still_apply() -> Result<()> {
    let input = format!("7;Bob;AB;1;{}", sha256_hex("B"));
    let harness = Harness::start(RuntimeConfig::default(), &input)?;
    let mut first = FakeWorker::new("fake-1");
    let mut second = FakeWorker::new("fake-2");

    harness.register(&first);
    harness.register(&second);
    harness.master.tell(MasterMessage::Start);
    first.next_task().await?;
    second.next_task().await?;

    // The 'A' hint matched before its worker died
    harness.master.tell(MasterMessage::PasswordChar {
        record_index: 7,
        excluded_char: 'A',
    });
    first.crash();

    // The survivor finishes its own task, then the requeued one
    harness.master.tell(MasterMessage::HintsCompleted {
        worker_id: second.id(),
        excluded_char: 'B',
    });
    let Task::Hint(requeued) = second.next_task().await? else {
        bail!("expected the requeued hint task");
    };
    assert_eq!(requeued.excluded_char, 'A');
    harness.master.tell(MasterMessage::HintsCompleted {
        worker_id: second.id(),
        excluded_char: 'A',
    });

    let Task::Password(task) = second.next_task().await? else {
        bail!("expected a password task");
    };
    assert_eq!(task.alphabet, "B");

    harness.master.tell(MasterMessage::Shutdown);
    harness.finish().await?;
    Ok(())
}
