//! Runtime Core - Foundation for the password cracking cluster
//!
//! Provides the task and record types shared by coordinator and workers,
//! error handling, configuration, the worker registry and the async
//! runtime manager.

pub mod config;
pub mod error;
pub mod runtime;
pub mod types;
pub mod worker;

pub use config::{CoordinatorConfig, InputConfig, RuntimeConfig, TransportConfig, WorkerConfig};
pub use error::{Error, Result};
pub use runtime::{RuntimeManager, ShutdownReceiver, ShutdownSender};
pub use types::*;
pub use worker::{WorkerInfo, WorkerRegistry, WorkerRegistryHandle, WorkerState};
