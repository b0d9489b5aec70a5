//! Async runtime manager

use crate::{Error, Result, RuntimeConfig};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Shutdown signal sender
pub type ShutdownSender = broadcast::Sender<()>;

/// Shutdown signal receiver
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Runtime manager owning the Tokio runtime the cluster runs on
pub struct RuntimeManager {
    /// Taken on drop to shut down without waiting on search threads
    runtime: Option<Runtime>,

    handle: Handle,

    /// Shutdown signal sender
    shutdown_tx: ShutdownSender,
}

impl RuntimeManager {
    /// Create a runtime sized by `config.worker.runtime_threads`
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker.runtime_threads.max(1))
            .enable_all()
            .thread_name("cracker-runtime")
            .build()
            .map_err(|e| Error::Internal {
                message: format!("Failed to build Tokio runtime: {}", e),
            })?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            shutdown_tx,
        })
    }

    /// Get a shutdown receiver
    pub fn shutdown_receiver(&self) -> ShutdownReceiver {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown to all subscribers
    pub fn shutdown(&self) {
        info!("Initiating runtime shutdown");
        let _ = self.shutdown_tx.send(());
    }

    /// Block on a future until completion
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Spawn a task on the runtime
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

impl Drop for RuntimeManager {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = self.shutdown_tx.send(());

            // Search threads cannot be interrupted; do not wait for them
            runtime.shutdown_timeout(Duration::from_secs(1));
            info!("Runtime manager shut down");
        }
    }
}
