//! TCP accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::{self, Either};
use tokio::net::TcpListener;

use super::config::{DisconnectBehavior, ServerConfig};
use super::connection::{Connection, ConnectionHandle};
use crate::codec::WireCodec;
use crate::error::{MocapError, Result};
use crate::protocol::{Delegate, Session};
use crate::transport::TcpTransport;

type DelegateFactory = Arc<dyn Fn() -> Box<dyn Delegate> + Send + Sync>;
type ConnectionHook = Arc<dyn Fn(ConnectionHandle) + Send + Sync>;

/// Single-client session server.
///
/// Clients are served one at a time: while a session is live, further
/// connections wait in the listen backlog.
pub struct Server {
    config: ServerConfig,
    factory: DelegateFactory,
    on_connect: Option<ConnectionHook>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("on_connect", &self.on_connect.is_some())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Create a server; `factory` builds a fresh delegate for every client
    pub fn new<F, D>(config: ServerConfig, factory: F) -> Self
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: Delegate + 'static,
    {
        Self {
            config,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Delegate>),
            on_connect: None,
        }
    }

    /// Call `hook` with each client's [`ConnectionHandle`] before its session
    /// starts running
    pub fn with_connection_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConnectionHandle) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.addr).await.map_err(|e| {
            MocapError::Network(format!("Failed to bind {}: {e}", self.config.addr))
        })
    }

    /// Bind and serve until the disconnect policy says stop
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves or the
    /// disconnect policy says stop.
    ///
    /// `shutdown` is only observed between clients and while waiting for one.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            api_version = %self.config.server_info.api_version,
            disconnect_behavior = %self.config.disconnect_behavior,
            "listening"
        );

        let codec = WireCodec::new().with_max_frame_size(self.config.max_frame_size);
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            let accepted = match future::select(Box::pin(listener.accept()), shutdown.as_mut()).await
            {
                Either::Left((accepted, _)) => accepted,
                Either::Right(((), _)) => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                },
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                },
            };

            match TcpTransport::new(stream, codec) {
                Ok(transport) => {
                    let session = self.session_for(peer);
                    let connection = Connection::new(transport, session)
                        .with_poll_interval(self.config.ack_poll_interval)
                        .with_initiated_handshake(self.config.initiate_handshake);
                    if let Some(hook) = &self.on_connect {
                        hook(connection.handle());
                    }
                    if let Err(e) = connection.run().await {
                        tracing::debug!(peer = %peer, error = %e, "session ended abnormally");
                    }
                },
                Err(e) => tracing::warn!(peer = %peer, error = %e, "failed to set up connection"),
            }

            if self.config.disconnect_behavior == DisconnectBehavior::Terminate {
                tracing::info!("disconnect behavior is terminate, stopping");
                return Ok(());
            }
        }
    }

    fn session_for(&self, peer: SocketAddr) -> Session {
        let session = Session::with_boxed_delegate((self.factory)())
            .with_server_info(self.config.server_info.clone());
        let span = tracing::info_span!("session", id = %session.id(), peer = %peer);
        let session = session.with_span(span);
        match self.config.ack_timeout {
            Some(timeout) => session.with_ack_timeout(timeout),
            None => session,
        }
    }
}
