//! Per-connection driver.
//!
//! Pumps envelopes from a [`Transport`] through a [`Session`] and writes the
//! replies back in order. Acknowledgment deadlines are checked on a timer
//! tick between envelopes.
//!
//! ```text
//!  peer ──next_envelope──┐
//!  ConnectionHandle ─────┼──> select! ──> Session ──send──> peer
//!  poll tick ────────────┘
//! ```
//!
//! Server-initiated messages enter through a [`ConnectionHandle`], so the
//! session is only ever touched by the driver task.

use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::{MocapError, Result};
use crate::protocol::{AckContinuation, Envelope, ErrorPayload, Payload, Session, SessionStats};
use crate::transport::Transport;

const OUTBOUND_CAPACITY: usize = 32;

/// Server-initiated work queued for the driver
enum Outbound {
    WithAck(Payload, Option<AckContinuation>),
    MotionInfo,
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithAck(payload, _) => write!(f, "WithAck({})", payload.kind()),
            Self::MotionInfo => f.write_str("MotionInfo"),
        }
    }
}

/// Cloneable sender for server-initiated messages on a running [`Connection`]
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Send `payload` and register `continuation` for its acknowledgment.
    ///
    /// Fails once the connection has finished.
    pub async fn send_with_ack(
        &self,
        payload: Payload,
        continuation: Option<AckContinuation>,
    ) -> Result<()> {
        self.push(Outbound::WithAck(payload, continuation)).await
    }

    /// Report the current capture mode and transform to the peer
    pub async fn motion_info(&self) -> Result<()> {
        self.push(Outbound::MotionInfo).await
    }

    async fn push(&self, outbound: Outbound) -> Result<()> {
        self.tx
            .send(outbound)
            .await
            .map_err(|_| MocapError::Network("connection closed".to_string()))
    }
}

/// Drives one session over one transport until the peer goes away
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
    session: Session,
    poll_interval: Duration,
    initiate_handshake: bool,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: mpsc::Receiver<Outbound>,
}

impl<T: Transport> Connection<T> {
    /// Create a driver for `session` over `transport`
    pub fn new(transport: T, session: Session) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        Self {
            transport,
            session,
            poll_interval: Duration::from_millis(250),
            initiate_handshake: false,
            outbound_tx,
            outbound_rx,
        }
    }

    /// Handle for pushing server-initiated messages while [`run`](Self::run)
    /// is in progress
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            tx: self.outbound_tx.clone(),
        }
    }

    /// Set the acknowledgment expiry poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Send `SessionStart` before reading anything from the peer
    pub fn with_initiated_handshake(mut self, initiate: bool) -> Self {
        self.initiate_handshake = initiate;
        self
    }

    /// Get the session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the peer disconnects or the transport fails.
    ///
    /// The session is always shut down before this returns, so the delegate
    /// sees `session_will_shutdown` for every session that got past
    /// `Offline`.
    pub async fn run(mut self) -> Result<SessionStats> {
        tracing::info!(
            transport = self.transport.name(),
            peer = %self.transport.peer(),
            session_id = %self.session.id(),
            "client connected"
        );

        let result = self.pump().await;
        self.session.shutdown();

        let stats = self.session.stats();
        match &result {
            Ok(()) => tracing::info!(
                session_id = %stats.session_id,
                received = stats.messages_received,
                sent = stats.messages_sent,
                "client disconnected"
            ),
            Err(e) => tracing::warn!(
                session_id = %stats.session_id,
                error = %e,
                "connection closed with error"
            ),
        }
        result.map(|()| stats)
    }

    async fn pump(&mut self) -> Result<()> {
        if self.initiate_handshake {
            let start = self.session.start()?;
            self.transport.send(start).await?;
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = self.transport.next_envelope() => match inbound {
                    Ok(Some(envelope)) => {
                        if let Some(reply) = self.session.process(&envelope) {
                            self.transport.send(reply).await?;
                        }
                    },
                    Ok(None) => return Ok(()),
                    Err(err) if is_recoverable(&err) => {
                        tracing::warn!(error = %err, "discarding undecodable frame");
                        let reply = Envelope::error(None, ErrorPayload::from(&err));
                        self.transport.send(reply).await?;
                    },
                    Err(err) => return Err(err),
                },
                Some(outbound) = self.outbound_rx.recv() => {
                    let envelope = match outbound {
                        Outbound::WithAck(payload, continuation) => {
                            self.session.send_with_ack(payload, continuation)
                        },
                        Outbound::MotionInfo => self.session.motion_info(),
                    };
                    tracing::debug!(
                        message_id = %envelope.id(),
                        kind = ?envelope.kind(),
                        "sending server-initiated message"
                    );
                    self.transport.send(envelope).await?;
                },
                _ = ticker.tick() => {
                    let expired = self.session.poll_timeouts(Instant::now());
                    if expired > 0 {
                        tracing::debug!(expired, "acknowledgments timed out");
                    }
                },
            }
        }
    }
}

/// Frame-level failures after which the stream is still aligned
fn is_recoverable(err: &MocapError) -> bool {
    matches!(
        err,
        MocapError::Checksum { .. } | MocapError::Json(_) | MocapError::MalformedMessage(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        AckOutcome, ErrorType, MotionMode, NoopDelegate, SessionProperties, SessionStatus,
        StaticScene, Transform,
    };
    use crate::transport::ChannelTransport;

    async fn recv(client: &mut ChannelTransport) -> Envelope {
        client.next_envelope().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_handshake_and_disconnect() {
        let (server, mut client) = ChannelTransport::pair();
        let driver = tokio::spawn(Connection::new(server, Session::new(NoopDelegate)).run());

        let start = Envelope::new(Payload::SessionStart {
            server_info: Default::default(),
        });
        client.send(start).await.unwrap();
        let reply = recv(&mut client).await;
        assert!(matches!(reply.payload, Some(Payload::SessionStart { .. })));

        client
            .send(Envelope::new(Payload::SessionActivate {
                properties: SessionProperties::new("test", "1.0"),
            }))
            .await
            .unwrap();
        client
            .send(Envelope::new(Payload::MotionSetMode {
                mode: MotionMode::Live,
            }))
            .await
            .unwrap();
        assert!(matches!(
            recv(&mut client).await.payload,
            Some(Payload::Acknowledge {})
        ));

        drop(client);
        let stats = driver.await.unwrap().unwrap();
        assert_eq!(stats.messages_received, 3);
        assert_eq!(stats.status, SessionStatus::Offline);
    }

    #[tokio::test]
    async fn test_initiated_handshake() {
        let (server, mut client) = ChannelTransport::pair();
        let session = Session::new(StaticScene::new(["cam1"]));
        let driver = tokio::spawn(
            Connection::new(server, session)
                .with_initiated_handshake(true)
                .run(),
        );

        let start = recv(&mut client).await;
        assert!(matches!(start.payload, Some(Payload::SessionStart { .. })));
        assert!(start.response_id().is_none());

        drop(client);
        driver.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let (server, mut client) = ChannelTransport::pair();
        let driver = tokio::spawn(Connection::new(server, Session::new(NoopDelegate)).run());

        let request = Envelope::new(Payload::GetCameraList {});
        client.send(request.clone()).await.unwrap();
        let reply = recv(&mut client).await;
        assert_eq!(reply.response_id(), Some(request.id()));
        assert_eq!(
            reply.get_error().and_then(ErrorPayload::kind),
            Some(ErrorType::SessionNotActive)
        );

        client
            .send(Envelope::new(Payload::SessionStart {
                server_info: Default::default(),
            }))
            .await
            .unwrap();
        assert!(matches!(
            recv(&mut client).await.payload,
            Some(Payload::SessionStart { .. })
        ));

        drop(client);
        driver.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_server_initiated_message_acknowledged() {
        let (server, mut client) = ChannelTransport::pair();
        let connection = Connection::new(server, Session::new(NoopDelegate));
        let handle = connection.handle();
        let driver = tokio::spawn(connection.run());

        let (tx, rx) = tokio::sync::oneshot::channel();
        handle
            .send_with_ack(
                Payload::MotionInfo {
                    mode: MotionMode::Off,
                    xform: Transform::zero(),
                },
                Some(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                })),
            )
            .await
            .unwrap();

        let info = recv(&mut client).await;
        assert!(matches!(info.payload, Some(Payload::MotionInfo { .. })));
        client
            .send(Envelope::reply(info.id(), Payload::Acknowledge {}))
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), AckOutcome::Acknowledged);

        drop(client);
        let stats = driver.await.unwrap().unwrap();
        assert_eq!(stats.pending_acks, 0);
        assert_eq!(stats.messages_sent, 1);

        assert!(handle.motion_info().await.is_err());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(is_recoverable(&MocapError::Checksum {
            expected: 1,
            actual: 2
        }));
        assert!(!is_recoverable(&MocapError::FrameTooLarge {
            size: 10,
            limit: 5
        }));
        assert!(!is_recoverable(&MocapError::Network("reset".to_string())));
    }
}
