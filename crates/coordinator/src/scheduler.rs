//! Two-phase scheduling state of the master
//!
//! The scheduler owns the task queues, the idle pool, the busy maps and the
//! password records. It performs no I/O: every transition returns the
//! [`Assignment`]s the caller must deliver, which keeps the phase logic
//! testable without actors.
//!
//! Phase one (hints) runs while input keeps arriving: each batch becomes one
//! hint task per alphabet character. Once input is exhausted and no hint
//! work is queued or in flight, phase two builds one password task per
//! record from the reduced alphabets. The run is complete when phase two
//! has drained as well.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use runtime_core::{
    Error, HintDigests, HintTask, PasswordRecord, PasswordTask, RecordIndex, Result, Task,
    WorkerId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Field positions within an input line
const FIELD_INDEX: usize = 0;
const FIELD_ALPHABET: usize = 2;
const FIELD_LENGTH: usize = 3;
const FIELD_TARGET: usize = 4;
const FIELD_HINTS: usize = 5;

/// A task to be delivered to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub worker_id: WorkerId,
    pub task: Task,
}

/// Summary of an accepted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records created from the batch
    pub records: usize,

    /// Hint tasks enqueued for the batch
    pub hint_tasks: usize,

    /// Assignments made to idle workers
    pub assignments: Vec<Assignment>,
}

/// Current phase of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Hints,
    Passwords,
    Finished,
}

/// Status snapshot served by the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub phase: Phase,
    pub input_exhausted: bool,
    pub records: usize,
    pub pending_hint_tasks: usize,
    pub pending_password_tasks: usize,
    pub registered_workers: usize,
    pub idle_workers: usize,
    pub busy_hint_workers: usize,
    pub busy_password_workers: usize,
    pub results_reported: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

/// A batch validated in full before any state changes
struct ParsedBatch {
    records: Vec<PasswordRecord>,
    alphabet: String,
    hint_digests: HintDigests,
}

/// Scheduling state of the master
#[derive(Debug)]
pub struct Scheduler {
    hint_queue: VecDeque<HintTask>,
    password_queue: VecDeque<PasswordTask>,
    idle: VecDeque<WorkerId>,
    busy_hint: HashMap<WorkerId, HintTask>,
    busy_password: HashMap<WorkerId, PasswordTask>,
    known: HashSet<WorkerId>,
    records: BTreeMap<RecordIndex, PasswordRecord>,
    hint_phase_active: bool,
    input_exhausted: bool,
    finalized: bool,
    results_reported: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            hint_queue: VecDeque::new(),
            password_queue: VecDeque::new(),
            idle: VecDeque::new(),
            busy_hint: HashMap::new(),
            busy_password: HashMap::new(),
            known: HashSet::new(),
            records: BTreeMap::new(),
            hint_phase_active: true,
            input_exhausted: false,
            finalized: false,
            results_reported: 0,
        }
    }

    /// Turn a non-empty batch into records and hint tasks.
    ///
    /// The whole batch is validated first; a malformed line rejects the
    /// batch without touching any state.
    pub fn ingest_batch(&mut self, lines: &[Vec<String>]) -> Result<BatchOutcome> {
        if self.input_exhausted || !self.hint_phase_active {
            return Err(Error::InputClosed);
        }

        let parsed = self.parse_batch(lines)?;
        let records = parsed.records.len();
        for record in parsed.records {
            self.records.insert(record.index, record);
        }

        let digests = Arc::new(parsed.hint_digests);
        let mut hint_tasks = 0;
        for excluded_char in parsed.alphabet.chars() {
            self.hint_queue
                .push_back(HintTask::new(&parsed.alphabet, excluded_char, digests.clone()));
            hint_tasks += 1;
        }

        info!(
            records,
            hint_tasks,
            alphabet = %parsed.alphabet,
            "Batch accepted"
        );

        Ok(BatchOutcome {
            records,
            hint_tasks,
            assignments: self.dispatch(),
        })
    }

    fn parse_batch(&self, lines: &[Vec<String>]) -> Result<ParsedBatch> {
        let first = lines
            .first()
            .ok_or_else(|| Error::malformed(0, "empty batch"))?;

        if first.len() <= FIELD_TARGET {
            return Err(Error::malformed(
                1,
                format!("expected at least {} fields, got {}", FIELD_TARGET + 1, first.len()),
            ));
        }

        // Alphabet and length are shared by the whole batch
        let mut alphabet = String::new();
        for c in first[FIELD_ALPHABET].trim().chars() {
            if !alphabet.contains(c) {
                alphabet.push(c);
            }
        }
        if alphabet.is_empty() {
            return Err(Error::malformed(1, "empty alphabet"));
        }

        let length: usize = first[FIELD_LENGTH]
            .trim()
            .parse()
            .map_err(|_| Error::malformed(1, format!("invalid length {:?}", first[FIELD_LENGTH])))?;

        let mut records = Vec::with_capacity(lines.len());
        let mut seen = HashSet::new();
        let mut hint_digests = HintDigests::new();

        for (offset, fields) in lines.iter().enumerate() {
            let line = offset + 1;
            if fields.len() <= FIELD_TARGET {
                return Err(Error::malformed(
                    line,
                    format!("expected at least {} fields, got {}", FIELD_TARGET + 1, fields.len()),
                ));
            }

            let index: RecordIndex = fields[FIELD_INDEX].trim().parse().map_err(|_| {
                Error::malformed(line, format!("invalid record id {:?}", fields[FIELD_INDEX]))
            })?;
            if self.records.contains_key(&index) || !seen.insert(index) {
                return Err(Error::malformed(line, format!("duplicate record id {}", index)));
            }

            let target = fields[FIELD_TARGET].trim().to_ascii_lowercase();
            if target.is_empty() {
                return Err(Error::malformed(line, "empty password digest"));
            }

            for hint in &fields[FIELD_HINTS..] {
                let hint = hint.trim();
                if hint.is_empty() {
                    continue;
                }
                hint_digests
                    .entry(hint.to_ascii_lowercase())
                    .or_default()
                    .push(index);
            }

            records.push(PasswordRecord::new(index, &alphabet, length, target));
        }

        Ok(ParsedBatch {
            records,
            alphabet,
            hint_digests,
        })
    }

    /// Remove a character from a record's alphabet.
    ///
    /// Returns whether the alphabet changed.
    pub fn eliminate(&mut self, record_index: RecordIndex, excluded_char: char) -> Result<bool> {
        let record = self
            .records
            .get_mut(&record_index)
            .ok_or(Error::RecordNotFound {
                index: record_index,
            })?;

        if !self.hint_phase_active {
            debug!(
                record_index,
                excluded_char = %excluded_char,
                "Elimination after password tasks were built"
            );
        }
        Ok(record.eliminate(excluded_char))
    }

    /// Add a worker to the idle pool and hand it pending work
    pub fn register(&mut self, worker_id: &str) -> Result<Vec<Assignment>> {
        if !self.known.insert(worker_id.to_string()) {
            return Err(Error::WorkerAlreadyRegistered {
                worker_id: worker_id.to_string(),
            });
        }
        self.idle.push_back(worker_id.to_string());
        Ok(self.advance())
    }

    /// A worker finished its hint task.
    ///
    /// Returns `None` if the worker held no hint task.
    pub fn hints_completed(&mut self, worker_id: &str) -> Option<Vec<Assignment>> {
        if !self.known.contains(worker_id) || self.busy_hint.remove(worker_id).is_none() {
            warn!(worker_id, "Hint completion from a worker without a hint task");
            return None;
        }
        Some(self.release(worker_id.to_string()))
    }

    /// A worker finished its password task.
    ///
    /// Returns `None` if the worker held no password task; the caller should
    /// then drop the result since the task was handed out again.
    pub fn password_completed(&mut self, worker_id: &str) -> Option<Vec<Assignment>> {
        if !self.known.contains(worker_id) || self.busy_password.remove(worker_id).is_none() {
            warn!(worker_id, "Password completion from a worker without a password task");
            return None;
        }
        self.results_reported += 1;
        Some(self.release(worker_id.to_string()))
    }

    /// Forget a worker, putting its in-flight task back at the queue head
    pub fn worker_lost(&mut self, worker_id: &str) -> Vec<Assignment> {
        if !self.known.remove(worker_id) {
            return Vec::new();
        }
        self.idle.retain(|w| w != worker_id);

        if let Some(task) = self.busy_hint.remove(worker_id) {
            info!(worker_id, task = %Task::Hint(task.clone()), "Requeueing hint task of lost worker");
            self.hint_queue.push_front(task);
        }
        if let Some(task) = self.busy_password.remove(worker_id) {
            info!(
                worker_id,
                task = %Task::Password(task.clone()),
                "Requeueing password task of lost worker"
            );
            self.password_queue.push_front(task);
        }

        self.advance()
    }

    /// The reader has no more batches
    pub fn end_of_input(&mut self) -> Vec<Assignment> {
        if !self.input_exhausted {
            info!(records = self.records.len(), "Input exhausted");
        }
        self.input_exhausted = true;
        self.advance()
    }

    /// True once both phases have drained and nothing is in flight
    pub fn is_complete(&self) -> bool {
        self.input_exhausted
            && !self.hint_phase_active
            && self.hint_queue.is_empty()
            && self.password_queue.is_empty()
            && self.busy_hint.is_empty()
            && self.busy_password.is_empty()
    }

    /// Claim the single finalization of a completed run
    pub fn take_finalize(&mut self) -> bool {
        if self.is_complete() {
            self.mark_finalized()
        } else {
            false
        }
    }

    /// Claim finalization regardless of progress, e.g. on shutdown
    pub fn mark_finalized(&mut self) -> bool {
        !std::mem::replace(&mut self.finalized, true)
    }

    /// Record with the given index
    pub fn record(&self, index: RecordIndex) -> Option<&PasswordRecord> {
        self.records.get(&index)
    }

    pub fn phase(&self) -> Phase {
        if self.is_complete() {
            Phase::Finished
        } else if self.hint_phase_active {
            Phase::Hints
        } else {
            Phase::Passwords
        }
    }

    /// Counters for the status API; timing is filled in by the master
    pub fn snapshot(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            phase: self.phase(),
            input_exhausted: self.input_exhausted,
            records: self.records.len(),
            pending_hint_tasks: self.hint_queue.len(),
            pending_password_tasks: self.password_queue.len(),
            registered_workers: self.known.len(),
            idle_workers: self.idle.len(),
            busy_hint_workers: self.busy_hint.len(),
            busy_password_workers: self.busy_password.len(),
            results_reported: self.results_reported,
            started_at: None,
            elapsed_ms: 0,
        }
    }

    /// Give a freed worker the next task, opening phase two if it is due
    fn release(&mut self, worker_id: WorkerId) -> Vec<Assignment> {
        if let Some(task) = self.next_task() {
            return vec![self.assign(worker_id, task)];
        }

        if self.try_start_password_phase() {
            let mut assignments = Vec::new();
            match self.next_task() {
                Some(task) => assignments.push(self.assign(worker_id, task)),
                None => self.idle.push_back(worker_id),
            }
            assignments.extend(self.dispatch());
            return assignments;
        }

        self.idle.push_back(worker_id);
        Vec::new()
    }

    fn advance(&mut self) -> Vec<Assignment> {
        self.try_start_password_phase();
        self.dispatch()
    }

    /// Pair idle workers with queued tasks, hint tasks first
    fn dispatch(&mut self) -> Vec<Assignment> {
        let mut assignments = Vec::new();
        while !self.idle.is_empty() {
            let Some(task) = self.next_task() else { break };
            let Some(worker_id) = self.idle.pop_front() else { break };
            assignments.push(self.assign(worker_id, task));
        }
        assignments
    }

    fn next_task(&mut self) -> Option<Task> {
        self.hint_queue
            .pop_front()
            .map(Task::Hint)
            .or_else(|| self.password_queue.pop_front().map(Task::Password))
    }

    fn assign(&mut self, worker_id: WorkerId, task: Task) -> Assignment {
        match &task {
            Task::Hint(t) => {
                self.busy_hint.insert(worker_id.clone(), t.clone());
            }
            Task::Password(t) => {
                self.busy_password.insert(worker_id.clone(), t.clone());
            }
        }
        debug!(worker_id = %worker_id, task = %task, "Task assigned");
        Assignment { worker_id, task }
    }

    fn try_start_password_phase(&mut self) -> bool {
        if !self.hint_phase_active
            || !self.input_exhausted
            || !self.hint_queue.is_empty()
            || !self.busy_hint.is_empty()
        {
            return false;
        }

        self.hint_phase_active = false;
        self.password_queue
            .extend(self.records.values().map(PasswordTask::from));
        info!(
            password_tasks = self.password_queue.len(),
            "Hint phase complete, starting password phase"
        );
        true
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for w in &self.idle {
            assert!(self.known.contains(w), "idle worker {} unknown", w);
            assert!(!self.busy_hint.contains_key(w), "{} idle and busy", w);
            assert!(!self.busy_password.contains_key(w), "{} idle and busy", w);
        }
        for w in self.busy_hint.keys() {
            assert!(self.known.contains(w));
            assert!(!self.busy_password.contains_key(w), "{} holds two tasks", w);
        }
        for w in self.busy_password.keys() {
            assert!(self.known.contains(w));
        }
        let accounted = self.idle.len() + self.busy_hint.len() + self.busy_password.len();
        assert_eq!(accounted, self.known.len(), "worker pools out of sync");
        if !self.hint_phase_active {
            assert!(self.hint_queue.is_empty() && self.busy_hint.is_empty());
        } else {
            assert!(self.password_queue.is_empty() && self.busy_password.is_empty());
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
