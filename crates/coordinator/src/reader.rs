//! Batch input: sources and the reader actor
//!
//! A [`BatchSource`] yields input lines split into fields, a bounded number
//! at a time. The reader actor pulls one batch per request from the master
//! on a blocking thread and answers with [`MasterMessage::Batch`]; an empty
//! batch signals the end of input.

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::path::Path;

use runtime_core::{Error, InputConfig, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{Batch, MasterMessage, MasterRef};

/// A source of input lines
pub trait BatchSource: Send + 'static {
    /// Next batch of lines; empty once the source is exhausted
    fn next_batch(&mut self) -> Result<Batch>;
}

/// Reads `;`-separated records from CSV
pub struct CsvBatchSource<R> {
    reader: csv::Reader<R>,
    batch_size: usize,
}

impl CsvBatchSource<File> {
    /// Open a CSV file
    pub fn open(path: impl AsRef<Path>, config: &InputConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened input file");
        Self::from_reader(file, config)
    }
}

impl<R: io::Read + Send + 'static> CsvBatchSource<R> {
    /// Wrap any reader
    pub fn from_reader(reader: R, config: &InputConfig) -> Result<Self> {
        if !config.delimiter.is_ascii() {
            return Err(Error::InvalidConfig {
                message: format!("input.delimiter {:?} is not ASCII", config.delimiter),
            });
        }
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig {
                message: "input.batch_size must be positive".to_string(),
            });
        }

        let reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter as u8)
            .has_headers(config.has_headers)
            .flexible(true)
            .from_reader(reader);

        Ok(Self {
            reader,
            batch_size: config.batch_size,
        })
    }
}

impl<R: io::Read + Send + 'static> BatchSource for CsvBatchSource<R> {
    /// A line that fails to decode rejects its batch but not the lines after
    /// it; an I/O failure ends the source.
    fn next_batch(&mut self) -> Result<Batch> {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut rejected = None;
        let mut record = csv::StringRecord::new();

        for _ in 0..self.batch_size {
            match self.reader.read_record(&mut record) {
                Ok(true) => batch.push(record.iter().map(|field| field.trim().to_string()).collect()),
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(csv_error(e)),
                Err(e) => {
                    if rejected.is_none() {
                        rejected = Some(csv_error(e));
                    }
                }
            }
        }

        match rejected {
            Some(e) => Err(e),
            None => Ok(batch),
        }
    }
}

fn csv_error(e: csv::Error) -> Error {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    let reason = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        _ => Error::malformed(line, reason),
    }
}

/// Serves pre-split lines from memory
#[derive(Debug, Clone)]
pub struct VecBatchSource {
    lines: VecDeque<Vec<String>>,
    batch_size: usize,
}

impl VecBatchSource {
    pub fn new(lines: Vec<Vec<String>>, batch_size: usize) -> Self {
        Self {
            lines: lines.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Split `;`-separated text, one record per non-empty line
    pub fn from_text(text: &str, batch_size: usize) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.split(';').map(|f| f.trim().to_string()).collect())
            .collect();
        Self::new(lines, batch_size)
    }
}

impl BatchSource for VecBatchSource {
    fn next_batch(&mut self) -> Result<Batch> {
        let n = self.batch_size.min(self.lines.len());
        Ok(self.lines.drain(..n).collect())
    }
}

/// Messages accepted by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMessage {
    /// Read the next batch and send it to the master
    Read,
    Stop,
}

/// Cloneable address of the reader
#[derive(Debug, Clone)]
pub struct ReaderRef {
    tx: mpsc::UnboundedSender<ReaderMessage>,
}

impl ReaderRef {
    pub fn read(&self) {
        let _ = self.tx.send(ReaderMessage::Read);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(ReaderMessage::Stop);
    }
}

/// Reader actor
pub struct Reader {
    source: Option<Box<dyn BatchSource>>,
    inbox: mpsc::UnboundedReceiver<ReaderMessage>,
    master: MasterRef,
}

impl Reader {
    /// Start a reader answering to `master`
    pub fn spawn(source: impl BatchSource, master: MasterRef) -> (ReaderRef, JoinHandle<()>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let reader = Self {
            source: Some(Box::new(source)),
            inbox,
            master,
        };
        (ReaderRef { tx }, tokio::spawn(reader.run()))
    }

    async fn run(mut self) {
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                ReaderMessage::Read => {
                    let reply = match self.read_batch().await {
                        Ok(batch) => {
                            debug!(lines = batch.len(), "Batch read");
                            MasterMessage::Batch(batch)
                        }
                        Err(error) => MasterMessage::BatchRejected { error },
                    };
                    if !self.master.tell(reply) {
                        break;
                    }
                }
                ReaderMessage::Stop => break,
            }
        }
        debug!("Reader stopped");
    }

    /// Read on a blocking thread. Undecodable batches are rejected and the
    /// source kept; fatal failures end the input.
    async fn read_batch(&mut self) -> Result<Batch> {
        let Some(mut source) = self.source.take() else {
            return Ok(Batch::new());
        };

        let read = tokio::task::spawn_blocking(move || {
            let batch = source.next_batch();
            (source, batch)
        })
        .await;

        match read {
            Ok((source, Ok(batch))) => {
                if !batch.is_empty() {
                    self.source = Some(source);
                }
                Ok(batch)
            }
            Ok((source, Err(e))) if !e.is_fatal() => {
                warn!(error = %e, "Batch could not be decoded");
                self.source = Some(source);
                Err(e)
            }
            Ok((_, Err(e))) => {
                error!(error = %e, "Failed to read input, treating as end of input");
                Ok(Batch::new())
            }
            Err(e) => {
                error!(error = %e, "Input read task failed");
                Ok(Batch::new())
            }
        }
    }
}
