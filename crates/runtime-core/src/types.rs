//! Core type definitions for the cracking cluster

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Unique identifier types
pub type WorkerId = String;
pub type EndpointId = String;
pub type RecordIndex = u32;

/// Lowercase hex SHA-256 digest
pub type Digest = String;

/// Hint digest -> indices of the records that carry that hint, in input order
pub type HintDigests = HashMap<Digest, Vec<RecordIndex>>;

/// One password to crack, created from a single input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    /// Record identifier from the input
    pub index: RecordIndex,

    /// Remaining candidate characters, in input order
    pub alphabet: Vec<char>,

    /// Password length
    pub length: usize,

    /// Digest of the password
    pub target: Digest,
}

impl PasswordRecord {
    /// Create a record; repeated alphabet characters are collapsed
    pub fn new(index: RecordIndex, alphabet: &str, length: usize, target: impl Into<Digest>) -> Self {
        let mut chars = Vec::with_capacity(alphabet.len());
        for c in alphabet.chars() {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }

        Self {
            index,
            alphabet: chars,
            length,
            target: target.into(),
        }
    }

    /// Remove a character from the candidate alphabet.
    ///
    /// Returns true if the character was present.
    pub fn eliminate(&mut self, c: char) -> bool {
        let before = self.alphabet.len();
        self.alphabet.retain(|&a| a != c);
        self.alphabet.len() != before
    }

    /// Alphabet as a string
    pub fn alphabet_string(&self) -> String {
        self.alphabet.iter().collect()
    }
}

/// Search all permutations of `sequence` for known hint digests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintTask {
    /// Batch alphabet with `excluded_char` removed
    pub sequence: String,

    /// Character a matching hint proves absent from the password
    pub excluded_char: char,

    /// Hint digests of the whole batch, shared by all its hint tasks
    pub hint_digests: Arc<HintDigests>,
}

impl HintTask {
    /// Build the task that excludes `excluded_char` from `alphabet`
    pub fn new(alphabet: &str, excluded_char: char, hint_digests: Arc<HintDigests>) -> Self {
        Self {
            sequence: alphabet.chars().filter(|&c| c != excluded_char).collect(),
            excluded_char,
            hint_digests,
        }
    }
}

/// Search all fixed-length strings over a reduced alphabet for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordTask {
    /// Record this task cracks
    pub record_index: RecordIndex,

    /// Reduced alphabet
    pub alphabet: String,

    /// Password length
    pub length: usize,

    /// Digest of the password
    pub target: Digest,
}

impl From<&PasswordRecord> for PasswordTask {
    fn from(record: &PasswordRecord) -> Self {
        Self {
            record_index: record.index,
            alphabet: record.alphabet_string(),
            length: record.length,
            target: record.target.clone(),
        }
    }
}

/// Unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    Hint(HintTask),
    Password(PasswordTask),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Hint(_) => TaskKind::Hint,
            Task::Password(_) => TaskKind::Password,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Hint(t) => write!(f, "hint[-{}] {}", t.excluded_char, t.sequence),
            Task::Password(t) => write!(f, "password[{}] over {}", t.record_index, t.alphabet),
        }
    }
}

/// Task kind enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskKind {
    Hint,
    Password,
}

/// Outcome of a password search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResult {
    /// Record the search ran for
    pub record_index: RecordIndex,

    /// Cracked plaintext, `None` if the reduced alphabet held no match
    pub password: Option<String>,
}

impl fmt::Display for PasswordResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.password {
            Some(p) => write!(f, "{}: {}", self.record_index, p),
            None => write!(f, "{}: <not found>", self.record_index),
        }
    }
}
