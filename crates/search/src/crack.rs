//! Hint and password search over the generators

use crate::{sha256_hex_chars, FixedLengthStrings, Permutations};
use runtime_core::{HintTask, PasswordTask, RecordIndex};
use tracing::{debug, instrument};

/// Search every permutation of the task's sequence for hint digests.
///
/// `on_match` is called once per record index attached to a matching hint,
/// as soon as the permutation is found. Returns the number of matching
/// permutations.
#[instrument(skip_all, fields(excluded = %task.excluded_char, len = task.sequence.len()))]
pub fn crack_hints<F>(task: &HintTask, mut on_match: F) -> usize
where
    F: FnMut(RecordIndex),
{
    let mut permutations = Permutations::new(&task.sequence);
    let mut buf = String::with_capacity(task.sequence.len());
    let mut matches = 0;

    while let Some(candidate) = permutations.next_permutation() {
        let digest = sha256_hex_chars(candidate, &mut buf);
        if let Some(records) = task.hint_digests.get(&digest) {
            matches += 1;
            debug!(hint = %buf, records = records.len(), "Hint cracked");
            for &index in records {
                on_match(index);
            }
        }
    }

    matches
}

/// Search every fixed-length string over the task's alphabet for the target
#[instrument(skip_all, fields(record = task.record_index, alphabet = %task.alphabet))]
pub fn crack_password(task: &PasswordTask) -> Option<String> {
    let mut candidates = FixedLengthStrings::new(&task.alphabet, task.length);
    let mut buf = String::with_capacity(task.length);

    while let Some(candidate) = candidates.next_candidate() {
        if sha256_hex_chars(candidate, &mut buf) == task.target {
            return Some(buf);
        }
    }

    None
}
