//! SHA-256 digests rendered as lowercase hex

use runtime_core::Digest;
use sha2::{Digest as _, Sha256};

/// Hash a candidate string and render the digest as lowercase hex
pub fn sha256_hex(input: &str) -> Digest {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Hash a candidate given as characters, reusing `buf` for the UTF-8 bytes
pub fn sha256_hex_chars(chars: &[char], buf: &mut String) -> Digest {
    buf.clear();
    buf.extend(chars.iter());
    sha256_hex(buf)
}
