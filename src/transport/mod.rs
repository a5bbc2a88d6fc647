//! Transport layer abstraction.
//!
//! A transport delivers decoded envelopes in arrival order and writes
//! outgoing envelopes in the order they are handed over. The session core
//! never touches sockets; it only sees [`Transport`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Connection driver              │
//! │      (session + ack timeout poll)       │
//! └──────────────────┬──────────────────────┘
//!                    │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │  TcpTransport   │ │ ChannelTransport│
//! │ (framed bytes)  │ │  (in-memory)    │
//! └─────────────────┘ └─────────────────┘
//! ```

mod channel;
mod tcp;

pub use channel::ChannelTransport;
pub use tcp::TcpTransport;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::protocol::Envelope;

/// Boxed future returned by [`Transport`] methods
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Transport trait for pluggable envelope carriers.
///
/// `next_envelope` must be cancel-safe: the connection driver races it
/// against a timer.
pub trait Transport: Send {
    /// Wait for the next envelope; `Ok(None)` means the peer closed cleanly.
    fn next_envelope(&mut self) -> TransportFuture<'_, Option<Envelope>>;

    /// Write one envelope.
    fn send(&mut self, envelope: Envelope) -> TransportFuture<'_, ()>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;

    /// Describe the remote end for logging.
    fn peer(&self) -> String;
}
