//! Wire frames, fragmentation and reassembly

use bytes::Bytes;
use runtime_core::EndpointId;
use std::collections::HashMap;

use crate::{Result, TransportError};

/// Identifier of one large-message transfer, unique per sender
pub type TransferId = u64;

/// One message on the bounded channel between two transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A piece of the encoded payload, at most the fragment size
    Fragment {
        sender: EndpointId,
        transfer_id: TransferId,
        bytes: Bytes,
    },

    /// Terminal marker: all fragments of the transfer have been sent
    End {
        sender: EndpointId,
        receiver: EndpointId,
        transfer_id: TransferId,
    },
}

/// Split an encoded payload into pieces of at most `fragment_size` bytes.
///
/// Only the last piece may be shorter. An empty payload yields no pieces.
pub fn fragment(payload: Bytes, fragment_size: usize) -> Result<Vec<Bytes>> {
    if fragment_size == 0 {
        return Err(TransportError::InvalidFragmentSize(fragment_size));
    }

    Ok((0..payload.len())
        .step_by(fragment_size)
        .map(|start| payload.slice(start..(start + fragment_size).min(payload.len())))
        .collect())
}

/// Per-transfer fragment buffers on the receiving side
#[derive(Debug, Default)]
pub struct Reassembler {
    buffers: HashMap<(EndpointId, TransferId), Vec<Bytes>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to its transfer's buffer
    pub fn push(&mut self, sender: EndpointId, transfer_id: TransferId, bytes: Bytes) {
        self.buffers
            .entry((sender, transfer_id))
            .or_default()
            .push(bytes);
    }

    /// Concatenate and clear the transfer's buffer
    pub fn finish(&mut self, sender: &str, transfer_id: TransferId) -> Vec<u8> {
        let pieces = self
            .buffers
            .remove(&(sender.to_string(), transfer_id))
            .unwrap_or_default();

        let total = pieces.iter().map(Bytes::len).sum();
        let mut joined = Vec::with_capacity(total);
        for piece in pieces {
            joined.extend_from_slice(&piece);
        }
        joined
    }

    /// Number of transfers with buffered fragments
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}
