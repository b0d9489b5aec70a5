//! Messages exchanged between the master, its workers and the membership layer

use runtime_core::{Error, PasswordResult, RecordIndex, Result, WorkerId};
use tokio::sync::{mpsc, oneshot};
use transport::ProxyRef;

use crate::scheduler::CoordinatorStatus;

/// Role carried by the member that hosts the master
pub const MASTER_ROLE: &str = "master";

/// Endpoint name the master transmits tasks from
pub const MASTER_ENDPOINT: &str = "master";

/// Lines of one input batch, already split into fields
pub type Batch = Vec<Vec<String>>;

/// Everything the master reacts to
#[derive(Debug)]
pub enum MasterMessage {
    /// Begin the run: request the first batch
    Start,

    /// A batch from the reader; empty means input is exhausted
    Batch(Batch),

    /// The reader could not decode a batch; later batches still follow
    BatchRejected { error: Error },

    /// A worker joined
    Registration(WorkerHandle),

    /// A hint search proved `excluded_char` absent from a record's password
    PasswordChar {
        record_index: RecordIndex,
        excluded_char: char,
    },

    /// A worker finished a hint task
    HintsCompleted {
        worker_id: WorkerId,
        excluded_char: char,
    },

    /// A worker finished a password task, found or not
    PasswordCompleted {
        worker_id: WorkerId,
        result: PasswordResult,
    },

    /// Worker liveness signal
    Heartbeat { worker_id: WorkerId },

    /// A watched worker stopped
    WorkerLost { worker_id: WorkerId },

    /// Snapshot request from the status API
    Status(oneshot::Sender<CoordinatorStatus>),

    /// Stop the run, printing whatever was collected
    Shutdown,
}

/// Receiving half of the master's mailbox
pub type MasterInbox = mpsc::UnboundedReceiver<MasterMessage>;

/// Cloneable address of the master
#[derive(Debug, Clone)]
pub struct MasterRef {
    tx: mpsc::UnboundedSender<MasterMessage>,
}

impl MasterRef {
    /// Create a master address and the mailbox it feeds
    pub fn channel() -> (Self, MasterInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send a message, returning false once the master has stopped
    pub fn tell(&self, msg: MasterMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// True once the master has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the master for a status snapshot
    pub async fn status(&self) -> Result<CoordinatorStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.tell(MasterMessage::Status(reply_tx)) {
            return Err(Error::ChannelClosed {
                channel: "master".to_string(),
            });
        }
        reply_rx.await.map_err(|_| Error::ChannelClosed {
            channel: "master status reply".to_string(),
        })
    }
}

/// Control messages delivered to a worker outside the task transport
#[derive(Debug, Clone)]
pub enum WorkerControl {
    Membership(MembershipEvent),
    Stop,
}

/// Cluster membership changes
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    MemberUp(Member),
    MemberRemoved(Member),
}

/// A cluster member as seen by the membership layer
#[derive(Debug, Clone)]
pub struct Member {
    /// Unique member address
    pub address: String,

    /// Roles the member carries
    pub roles: Vec<String>,

    /// Master address, present when the member hosts the master
    pub master: Option<MasterRef>,
}

impl Member {
    /// The member hosting `master`
    pub fn master(address: impl Into<String>, master: MasterRef) -> Self {
        Self {
            address: address.into(),
            roles: vec![MASTER_ROLE.to_string()],
            master: Some(master),
        }
    }

    /// A member carrying only the given roles
    pub fn with_roles(address: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            address: address.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            master: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Member {}

/// What the master knows about a registered worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    /// Worker identifier
    pub id: WorkerId,

    /// Where tasks are transmitted to
    pub proxy: ProxyRef,

    /// Control channel; its closing signals the worker stopped
    pub control: mpsc::UnboundedSender<WorkerControl>,
}

impl WorkerHandle {
    /// Ask the worker to stop; false if it already has
    pub fn stop(&self) -> bool {
        self.control.send(WorkerControl::Stop).is_ok()
    }

    /// Deliver a membership event; false if the worker has stopped
    pub fn notify(&self, event: MembershipEvent) -> bool {
        self.control.send(WorkerControl::Membership(event)).is_ok()
    }
}
