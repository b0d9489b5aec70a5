//! Transport - chunked delivery of oversized messages
//!
//! Cluster channels carry bounded messages. Payloads larger than the
//! fragment size (128 bytes by default) are encoded, split into ordered
//! fragments and reassembled exactly once by the proxy colocated with the
//! destination endpoint.
//!
//! # Example
//!
//! ```no_run
//! use transport::{Delivery, LargeMessageProxy, Transmitter};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> transport::Result<()> {
//! let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<String>>();
//! let (peer, _task) = LargeMessageProxy::spawn("worker-1", tx);
//!
//! let mut transmitter = Transmitter::new("master", 128)?;
//! transmitter.send(&"x".repeat(1000), &peer)?;
//!
//! let delivery = rx.recv().await.unwrap();
//! assert_eq!(delivery.sender, "master");
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod error;
pub mod frame;
mod proxy;

pub use error::{Result, TransportError};
pub use frame::{fragment, Frame, Reassembler, TransferId};
pub use proxy::{Delivery, LargeMessageProxy, ProxyRef, Transmitter};
