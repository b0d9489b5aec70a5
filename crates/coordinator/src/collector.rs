//! Result aggregation actor

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Messages accepted by the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorMessage {
    /// Progress notice, logged and kept
    Progress(String),

    /// A cracked (or failed) password line
    Collect(String),

    /// Emit all collected results
    Print,

    Stop,
}

/// Everything the collector saw during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectorReport {
    /// Result lines in arrival order
    pub results: Vec<String>,

    /// Progress notices in arrival order
    pub progress: Vec<String>,

    /// How many times results were printed
    pub prints: usize,
}

/// Cloneable address of the collector
#[derive(Debug, Clone)]
pub struct CollectorRef {
    tx: mpsc::UnboundedSender<CollectorMessage>,
}

impl CollectorRef {
    pub fn progress(&self, notice: impl Into<String>) {
        let _ = self.tx.send(CollectorMessage::Progress(notice.into()));
    }

    pub fn collect(&self, result: impl Into<String>) {
        let _ = self.tx.send(CollectorMessage::Collect(result.into()));
    }

    pub fn print(&self) {
        let _ = self.tx.send(CollectorMessage::Print);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(CollectorMessage::Stop);
    }
}

/// Collects results until stopped
pub struct Collector {
    inbox: mpsc::UnboundedReceiver<CollectorMessage>,
    report: CollectorReport,
}

impl Collector {
    /// Start a collector; the task yields the report once stopped
    pub fn spawn() -> (CollectorRef, JoinHandle<CollectorReport>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let collector = Self {
            inbox,
            report: CollectorReport::default(),
        };
        (CollectorRef { tx }, tokio::spawn(collector.run()))
    }

    async fn run(mut self) -> CollectorReport {
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                CollectorMessage::Progress(notice) => {
                    info!(progress = %notice, "Progress");
                    self.report.progress.push(notice);
                }
                CollectorMessage::Collect(result) => {
                    debug!(result = %result, "Result collected");
                    self.report.results.push(result);
                }
                CollectorMessage::Print => {
                    self.report.prints += 1;
                    for result in &self.report.results {
                        println!("{}", result);
                    }
                    info!(results = self.report.results.len(), "Results printed");
                }
                CollectorMessage::Stop => break,
            }
        }
        self.report
    }
}
