//! Mocap session protocol: envelopes, session state and dispatch.
//!
//! A client device (typically a tablet used as a virtual camera) holds one
//! persistent connection to the server. After a short handshake it selects a
//! scene camera, switches capture on and streams transform updates.
//!
//! # Protocol Overview
//!
//! ## Message Flow
//!
//! ```text
//! Client                                   Server
//!    |                                       |
//!    |-------- session_start --------------->|  Offline -> Starting
//!    |<------- session_start (server_info) --|
//!    |-------- session_activate ------------>|  Starting -> Activated (no reply)
//!    |                                       |
//!    |-------- get_camera_list ------------->|
//!    |<------- camera_list ------------------|
//!    |-------- set_active_camera ----------->|
//!    |<------- active_camera_info -----------|
//!    |                                       |
//!    |-------- motion_set_mode (live) ------>|
//!    |<------- acknowledge ------------------|
//!    |======== motion_xform ================>|  fire-and-forget telemetry
//!    |                                       |
//!    |-------- session_shutdown ------------>|  -> Offline (no reply)
//! ```
//!
//! ## State Machine
//!
//! | Status      | Accepts                                   | Valid Transitions   |
//! |-------------|-------------------------------------------|---------------------|
//! | `Offline`   | session_start                             | → Starting          |
//! | `Starting`  | session_activate, session_shutdown        | → Activated, Offline|
//! | `Activated` | everything                                | → Offline           |
//!
//! Camera, mode and motion messages outside `Activated` are answered with
//! `SessionNotActiveError` and leave the state untouched.
//!
//! ## Error Types
//!
//! | Type                          | Fatal | Meaning                              |
//! |-------------------------------|-------|--------------------------------------|
//! | `MalformedMessageError`       | no    | Payload missing or unreadable        |
//! | `InvalidMessage`              | no    | Protocol violation                   |
//! | `CannotProcessMessage`        | no    | Lookup failed (e.g. unknown camera)  |
//! | `SessionNotActiveError`       | no    | Session must be activated first      |
//! | `ApplicationException`        | no    | No handler for the payload kind      |
//! | `APIVersionNotSupportedError` | yes   | Client API version incompatible      |
//! | `UnexpectedError`             | yes   | Internal or delegate fault           |
//!
//! Fatal errors shut the session down after the error reply is produced.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mocap::protocol::{Envelope, Payload, Session, StaticScene};
//!
//! let mut session = Session::new(StaticScene::new(["cam1", "cam2"]));
//! let reply = session.process(&incoming);
//! if let Some(reply) = reply {
//!     transport.send(reply).await?;
//! }
//! ```

mod ack;
mod capabilities;
mod delegate;
mod message;
mod session;
mod state;
mod types;

pub use ack::{AckContinuation, AckCoordinator, AckOutcome};
pub use capabilities::{FeatureSet, ServerInfo, SessionProperties};
pub use delegate::{
    Delegate, MotionDelegate, NoopDelegate, SceneDelegate, SessionDelegate, StaticScene,
};
pub use message::{
    new_message_id, Envelope, ErrorPayload, ErrorType, Header, MessageId, Payload, PayloadKind,
};
pub use session::Session;
pub use state::{SessionState, SessionStats, SessionStatus};
pub use types::{Camera, MotionMode, Transform, Vector3};

/// API version spoken by this server
pub const API_VERSION: &str = "1.0";
