//! Candidate search for the cracking cluster
//!
//! This crate provides:
//! - **Digests**: SHA-256 rendered as lowercase hex
//! - **Permutations**: Heap's algorithm, one permutation at a time
//! - **Fixed-length strings**: every string of a given length over an alphabet
//! - **Crack routines**: the hint and password searches a worker runs
//!
//! # Example
//!
//! ```rust
//! use search::{crack_password, sha256_hex};
//! use runtime_core::PasswordTask;
//!
//! let task = PasswordTask {
//!     record_index: 1,
//!     alphabet: "AB".to_string(),
//!     length: 2,
//!     target: sha256_hex("BA"),
//! };
//! assert_eq!(crack_password(&task).as_deref(), Some("BA"));
//! ```

mod crack;
mod digest;
mod permutation;
mod strings;

pub use crack::{crack_hints, crack_password};
pub use digest::{sha256_hex, sha256_hex_chars};
pub use permutation::Permutations;
pub use strings::FixedLengthStrings;
