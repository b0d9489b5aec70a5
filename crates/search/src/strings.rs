//! Fixed-length strings over an alphabet, with repetition
//!
//! Strings come out in the order depth-first prefix extension visits them:
//! lexicographic with respect to the alphabet's own character order.

/// Every string of `length` characters drawn from `alphabet`
#[derive(Debug, Clone)]
pub struct FixedLengthStrings {
    alphabet: Vec<char>,
    indices: Vec<usize>,
    current: Vec<char>,
    started: bool,
    exhausted: bool,
}

impl FixedLengthStrings {
    pub fn new(alphabet: &str, length: usize) -> Self {
        let alphabet: Vec<char> = alphabet.chars().collect();
        let exhausted = alphabet.is_empty() && length > 0;
        let current = match alphabet.first() {
            Some(&first) => vec![first; length],
            None => Vec::new(),
        };

        Self {
            alphabet,
            indices: vec![0; length],
            current,
            started: false,
            exhausted,
        }
    }

    /// Advance to the next string and borrow it
    pub fn next_candidate(&mut self) -> Option<&[char]> {
        if self.exhausted {
            return None;
        }

        if self.started {
            self.advance();
            if self.exhausted {
                return None;
            }
        } else {
            self.started = true;
        }

        Some(&self.current)
    }

    /// Step the rightmost position, carrying leftwards like an odometer
    fn advance(&mut self) {
        let base = self.alphabet.len();
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < base {
                self.current[pos] = self.alphabet[self.indices[pos]];
                return;
            }
            self.indices[pos] = 0;
            self.current[pos] = self.alphabet[0];
        }
        self.exhausted = true;
    }
}

impl Iterator for FixedLengthStrings {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_candidate().map(|s| s.iter().collect())
    }
}
