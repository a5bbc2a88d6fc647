//! Session server.
//!
//! Accepts one client at a time over TCP, runs a [`Session`] for it and
//! applies the [`DisconnectBehavior`] once the client goes away.
//!
//! ```text
//! accept ──► TcpTransport ──► Connection::run ──► Session::shutdown
//!   ▲                                                   │
//!   └────────────── RestartAlways ◄─────────────────────┤
//!                                                       ▼
//!                                          Terminate: return
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mocap::protocol::StaticScene;
//! use mocap::server::{Server, ServerConfig};
//!
//! let config = ServerConfig::default().with_port(7766);
//! let server = Server::new(config, || StaticScene::new(["cam1", "cam2"]));
//! server.run().await?;
//! ```
//!
//! [`Session`]: crate::protocol::Session

mod config;
mod connection;
mod listener;

pub use config::{DisconnectBehavior, ServerConfig, DEFAULT_PORT};
pub use connection::{Connection, ConnectionHandle};
pub use listener::Server;
