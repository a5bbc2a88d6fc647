//! In-memory transport for embedding and tests.

use tokio::sync::mpsc;

use super::{Transport, TransportFuture};
use crate::error::MocapError;
use crate::protocol::Envelope;

const CHANNEL_CAPACITY: usize = 100;

/// One end of an in-memory envelope pipe.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
    label: &'static str,
}

impl ChannelTransport {
    /// Create two connected ends: `(server, client)`
    pub fn pair() -> (Self, Self) {
        let (client_tx, server_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                tx: server_tx,
                rx: server_rx,
                label: "server",
            },
            Self {
                tx: client_tx,
                rx: client_rx,
                label: "client",
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn next_envelope(&mut self) -> TransportFuture<'_, Option<Envelope>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }

    fn send(&mut self, envelope: Envelope) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.tx
                .send(envelope)
                .await
                .map_err(|_| MocapError::Network("channel peer dropped".to_string()))
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }

    fn peer(&self) -> String {
        format!("in-memory {}", self.label)
    }
}
