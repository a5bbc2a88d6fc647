//! Authoritative in-memory record of one session.

use std::fmt;

use super::capabilities::SessionProperties;
use super::types::{Camera, MotionMode, Transform};

/// Session lifecycle status
///
/// ```text
///   Offline ──start──> Starting ──activate──> Activated
///      ^                  │                       │
///      └────shutdown──────┴───────shutdown────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No session; initial and terminal state
    #[default]
    Offline,
    /// `SessionStart` sent, waiting for activation
    Starting,
    /// Ready for camera and motion traffic
    Activated,
}

impl SessionStatus {
    /// Get descriptive name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Activated => "activated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Session state owned by the protocol core
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Lifecycle status
    pub status: SessionStatus,
    /// Camera selected by the client
    pub active_camera: Option<Camera>,
    /// Current capture mode
    pub capture_mode: MotionMode,
    /// Last accepted transform
    pub current_transform: Transform,
    /// Client properties received on activation
    pub properties: Option<SessionProperties>,
}

impl SessionState {
    /// Fresh offline state
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the session is activated
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Activated
    }

    /// Return to construction values
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Session ID
    pub session_id: String,
    /// Current status
    pub status: SessionStatus,
    /// Envelopes processed
    pub messages_received: u64,
    /// Envelopes produced
    pub messages_sent: u64,
    /// Transform updates accepted
    pub motion_updates: u64,
    /// Transform updates dropped because capture was off
    pub motion_dropped: u64,
    /// Acknowledgments still pending
    pub pending_acks: usize,
    /// Session uptime in seconds
    pub uptime_secs: u64,
}
