//! Large-message proxy: the receiving transport colocated with an endpoint
//!
//! A sender owns a [`Transmitter`], which encodes a payload, splits it into
//! fragments and pushes them in order into the destination's proxy, followed
//! by a terminal [`Frame::End`]. The [`LargeMessageProxy`] task buffers the
//! fragments per `(sender, transfer)` and, on the marker, decodes the payload
//! and hands it to its endpoint tagged with the original sender.

use crate::codec::{decode, encode};
use crate::frame::{fragment, Frame, Reassembler, TransferId};
use crate::{Result, TransportError};
use bytes::Bytes;
use runtime_core::EndpointId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Payload delivered to an endpoint with its original sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    pub sender: EndpointId,
    pub payload: T,
}

/// Address of an endpoint's proxy
#[derive(Debug, Clone)]
pub struct ProxyRef {
    owner: EndpointId,
    frames: mpsc::UnboundedSender<Frame>,
}

impl ProxyRef {
    /// Endpoint the proxy delivers to
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// True once the proxy task has stopped
    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }

    fn push(&self, frame: Frame) -> Result<()> {
        self.frames
            .send(frame)
            .map_err(|_| TransportError::PeerUnavailable {
                endpoint: self.owner.clone(),
            })
    }
}

/// Sending side of the transport; one per sending endpoint
#[derive(Debug)]
pub struct Transmitter {
    origin: EndpointId,
    fragment_size: usize,
    next_transfer: TransferId,
}

impl Transmitter {
    pub fn new(origin: impl Into<EndpointId>, fragment_size: usize) -> Result<Self> {
        if fragment_size == 0 {
            return Err(TransportError::InvalidFragmentSize(fragment_size));
        }

        Ok(Self {
            origin: origin.into(),
            fragment_size,
            next_transfer: 0,
        })
    }

    /// Send `payload` to the endpoint behind `peer`.
    ///
    /// Returns the number of fragments written.
    pub fn send<T: Serialize>(&mut self, payload: &T, peer: &ProxyRef) -> Result<usize> {
        let bytes = Bytes::from(encode(payload)?);
        let total = bytes.len();
        let transfer_id = self.next_transfer;
        self.next_transfer += 1;

        let pieces = fragment(bytes, self.fragment_size)?;
        let count = pieces.len();
        for piece in pieces {
            peer.push(Frame::Fragment {
                sender: self.origin.clone(),
                transfer_id,
                bytes: piece,
            })?;
        }

        peer.push(Frame::End {
            sender: self.origin.clone(),
            receiver: peer.owner.clone(),
            transfer_id,
        })?;

        debug!(
            receiver = %peer.owner,
            transfer_id,
            size_bytes = total,
            fragments = count,
            "Large message sent"
        );
        Ok(count)
    }
}

/// Receiving transport task for one endpoint
pub struct LargeMessageProxy<T> {
    owner: EndpointId,
    frames: mpsc::UnboundedReceiver<Frame>,
    deliver: mpsc::UnboundedSender<Delivery<T>>,
    reassembler: Reassembler,
    _payload: PhantomData<fn() -> T>,
}

impl<T> LargeMessageProxy<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Create a proxy for `owner` without starting it
    pub fn new(
        owner: impl Into<EndpointId>,
        deliver: mpsc::UnboundedSender<Delivery<T>>,
    ) -> (ProxyRef, Self) {
        let owner = owner.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let proxy_ref = ProxyRef {
            owner: owner.clone(),
            frames: tx,
        };
        let proxy = Self {
            owner,
            frames: rx,
            deliver,
            reassembler: Reassembler::new(),
            _payload: PhantomData,
        };
        (proxy_ref, proxy)
    }

    /// Start a proxy for `owner`, delivering decoded payloads into `deliver`
    pub fn spawn(
        owner: impl Into<EndpointId>,
        deliver: mpsc::UnboundedSender<Delivery<T>>,
    ) -> (ProxyRef, JoinHandle<()>) {
        let (proxy_ref, proxy) = Self::new(owner, deliver);
        (proxy_ref, tokio::spawn(proxy.run()))
    }

    /// Main proxy loop
    async fn run(mut self) {
        debug!(owner = %self.owner, "Large message proxy started");

        loop {
            tokio::select! {
                frame = self.frames.recv() => {
                    let Some(frame) = frame else { break };
                    if let Some(delivery) = self.handle(frame) {
                        if self.deliver.send(delivery).is_err() {
                            break;
                        }
                    }
                }
                _ = self.deliver.closed() => break,
            }
        }

        if self.reassembler.pending() > 0 {
            warn!(
                owner = %self.owner,
                pending = self.reassembler.pending(),
                "Proxy stopped with incomplete transfers"
            );
        }
        info!(owner = %self.owner, "Large message proxy stopped");
    }

    /// Apply one frame; returns a payload once a transfer completes
    pub fn handle(&mut self, frame: Frame) -> Option<Delivery<T>> {
        match frame {
            Frame::Fragment {
                sender,
                transfer_id,
                bytes,
            } => {
                self.reassembler.push(sender, transfer_id, bytes);
                None
            }
            Frame::End {
                sender,
                receiver,
                transfer_id,
            } => {
                let bytes = self.reassembler.finish(&sender, transfer_id);

                if receiver != self.owner {
                    warn!(
                        owner = %self.owner,
                        receiver = %receiver,
                        sender = %sender,
                        "Dropping large message addressed to another endpoint"
                    );
                    return None;
                }

                match decode::<T>(&bytes) {
                    Ok(payload) => Some(Delivery { sender, payload }),
                    Err(e) => {
                        error!(
                            owner = %self.owner,
                            sender = %sender,
                            transfer_id,
                            size_bytes = bytes.len(),
                            error = %e,
                            "Dropping undecodable large message"
                        );
                        None
                    }
                }
            }
        }
    }
}
