//! Heap's algorithm as a streaming iterator
//!
//! Each call to [`Permutations::next_permutation`] performs at most one swap
//! on an internal buffer, so the factorial-sized output is never
//! materialized. The sequence can only be restarted by building a new
//! iterator.

/// Every permutation of a character sequence, each exactly once
#[derive(Debug, Clone)]
pub struct Permutations {
    items: Vec<char>,
    counters: Vec<usize>,
    position: usize,
    started: bool,
}

impl Permutations {
    /// Permute the characters of `sequence` in their given order
    pub fn new(sequence: &str) -> Self {
        let items: Vec<char> = sequence.chars().collect();
        let counters = vec![0; items.len()];
        Self {
            items,
            counters,
            position: 1,
            started: false,
        }
    }

    /// Advance to the next permutation and borrow it.
    ///
    /// The first call yields the input order unchanged.
    pub fn next_permutation(&mut self) -> Option<&[char]> {
        if !self.started {
            self.started = true;
            return Some(&self.items);
        }

        let n = self.items.len();
        while self.position < n {
            let i = self.position;
            if self.counters[i] < i {
                if i % 2 == 0 {
                    self.items.swap(0, i);
                } else {
                    self.items.swap(self.counters[i], i);
                }
                self.counters[i] += 1;
                self.position = 1;
                return Some(&self.items);
            }

            self.counters[i] = 0;
            self.position += 1;
        }

        None
    }
}

impl Iterator for Permutations {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_permutation().map(|p| p.iter().collect())
    }
}
