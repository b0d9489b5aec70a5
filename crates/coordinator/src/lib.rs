//! Coordinator for the distributed password cracking cluster
//!
//! This crate provides:
//! - **Scheduling**: the two-phase hint/password state machine
//! - **Master**: the actor that owns the scheduler and drives a run
//! - **Workers**: actors that register with the master and run searches
//! - **Input**: CSV batch sources and the reader actor
//! - **Results**: the collector actor
//! - **Cluster**: an in-process membership layer tying the actors together
//! - **Status API**: read-only HTTP endpoints over a running cluster
//!
//! # Example
//!
//! ```no_run
//! use coordinator::{LocalCluster, VecBatchSource};
//! use runtime_core::RuntimeConfig;
//!
//! # async fn run() -> runtime_core::Result<()> {
//! let source = VecBatchSource::from_text("1;Alice;ab;1;<digest>", 100);
//! let cluster = LocalCluster::start(RuntimeConfig::default(), source)?;
//! let report = cluster.wait().await?;
//! for line in &report.results {
//!     println!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod collector;
pub mod http_api;
pub mod master;
pub mod protocol;
pub mod reader;
pub mod scheduler;
pub mod server;
pub mod worker;

pub use cluster::LocalCluster;
pub use collector::{Collector, CollectorRef, CollectorReport};
pub use master::Master;
pub use protocol::{
    Batch, MasterMessage, MasterRef, Member, MembershipEvent, WorkerControl, WorkerHandle,
    MASTER_ROLE,
};
pub use reader::{BatchSource, CsvBatchSource, Reader, ReaderRef, VecBatchSource};
pub use scheduler::{Assignment, CoordinatorStatus, Phase, Scheduler};
pub use server::{ServerConfig, StatusServer};
pub use worker::Worker;
