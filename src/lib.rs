//! # Mocap - Motion-Capture Session Protocol
//!
//! Session state machine and message dispatch core for a real-time
//! motion-capture collaboration link: one client device drives camera
//! selection, capture mode and a continuous stream of transforms on a
//! server application.
//!
//! ## Features
//!
//! - **Session lifecycle**: `Offline → Starting → Activated` handshake with
//!   API version check
//! - **Typed dispatch**: exhaustive routing over every payload kind
//! - **Acknowledgments**: continuations for server-initiated messages, with
//!   optional deadlines
//! - **Delegates**: capability traits through which the application observes
//!   and answers the session
//! - **Binary framing**: varint length, CRC32 checksum, JSON body
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                    Server
//!    |                                         |
//!    |------ SessionStart ------------------->|
//!    |<----- SessionStart (server_info) ------|   Offline → Starting
//!    |------ SessionActivate (properties) --->|   Starting → Activated
//!    |                                         |
//!    |------ GetCameraList ------------------>|
//!    |<----- CameraList ----------------------|
//!    |------ SetActiveCamera ---------------->|
//!    |<----- ActiveCameraInfo ----------------|
//!    |------ MotionSetMode (live) ----------->|
//!    |<----- Acknowledge ---------------------|
//!    |====== MotionUpdateXForm ==============>|   (no reply)
//!    |                                         |
//!    |------ SessionShutdown ---------------->|   → Offline
//! ```
//!
//! ### Message Types
//!
//! | Payload             | Direction      | Reply                      |
//! |---------------------|----------------|----------------------------|
//! | `session_start`     | Both           | `session_start`            |
//! | `session_activate`  | Client→Server  | none                       |
//! | `session_shutdown`  | Client→Server  | none                       |
//! | `acknowledge`       | Both           | none                       |
//! | `error`             | Both           | none                       |
//! | `get_camera_list`   | Client→Server  | `camera_list`              |
//! | `set_active_camera` | Client→Server  | `active_camera_info`       |
//! | `motion_set_mode`   | Client→Server  | `acknowledge`              |
//! | `motion_get_mode`   | Client→Server  | `motion_active_mode`       |
//! | `motion_xform`      | Client→Server  | none                       |
//! | `motion_info`       | Server→Client  | none                       |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mocap::protocol::{Envelope, Payload, Session, StaticScene};
//!
//! let mut session = Session::new(StaticScene::new(["cam1", "cam2"]));
//!
//! let start = Envelope::new(Payload::SessionStart { server_info: Default::default() });
//! let reply = session.process(&start);
//! assert!(reply.is_some());
//! ```
//!
//! ### Serving over TCP
//!
//! ```rust,ignore
//! use mocap::protocol::StaticScene;
//! use mocap::server::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default(), || StaticScene::new(["cam1"]));
//! server.run().await?;
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Session state machine, messages, delegates
//! - [`codec`]: Binary frame encoding
//! - [`transport`]: Envelope carriers (TCP, in-memory)
//! - [`server`]: Single-client TCP server
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use codec::{FrameDecoder, WireCodec};
pub use config::Config;
pub use error::{MocapError, Result};
pub use protocol::{
    Camera, Delegate, Envelope, MotionMode, Payload, Session, SessionStatus, Transform,
    API_VERSION,
};
pub use server::{Connection, ConnectionHandle, DisconnectBehavior, Server, ServerConfig};
pub use transport::{ChannelTransport, TcpTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
