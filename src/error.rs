//! Mocap protocol error types.
//!
//! Every fault that can occur while processing a session maps onto one of the
//! wire-level [`ErrorType`]s through [`MocapError::error_type`]. Faults that
//! leave the session in an unknown state are *fatal*: the dispatcher answers
//! with an error envelope and then shuts the session down.

use thiserror::Error;

use crate::protocol::ErrorType;

/// Mocap protocol errors.
#[derive(Error, Debug)]
pub enum MocapError {
    /// The incoming envelope carried no payload or could not be interpreted.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The envelope was well formed but violates the protocol.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Operation requires an activated session.
    #[error("Session not active: {0}")]
    SessionNotActive(String),

    /// The delegate could not resolve the requested camera.
    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    /// The peer requested an API version this server cannot speak.
    #[error("API version not supported: {0}")]
    ApiVersionNotSupported(String),

    /// No inbound handler exists for the payload kind.
    #[error("Cannot handle payload: {0}")]
    UnhandledPayload(String),

    /// The embedding application's delegate reported a failure.
    #[error("Delegate error: {0}")]
    Delegate(String),

    /// Frame encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Frame exceeds the configured size limit.
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge {
        /// Announced frame size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Frame body failed its CRC32 check.
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    Checksum {
        /// Checksum carried by the frame.
        expected: u32,
        /// Checksum computed over the received body.
        actual: u32,
    },

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mocap operations
pub type Result<T> = std::result::Result<T, MocapError>;

impl MocapError {
    /// Wire-level error category reported to the peer.
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::MalformedMessage(_) | Self::Codec(_) | Self::Checksum { .. } | Self::Json(_) => {
                ErrorType::MalformedMessage
            },
            Self::InvalidMessage(_) | Self::FrameTooLarge { .. } => ErrorType::InvalidMessage,
            Self::SessionNotActive(_) => ErrorType::SessionNotActive,
            Self::CameraNotFound(_) => ErrorType::CannotProcessMessage,
            Self::ApiVersionNotSupported(_) => ErrorType::ApiVersionNotSupported,
            Self::UnhandledPayload(_) => ErrorType::ApplicationException,
            Self::Delegate(_) | Self::Network(_) | Self::Config(_) | Self::Io(_) => {
                ErrorType::UnexpectedError
            },
        }
    }

    /// Whether this error forces the session to shut down.
    pub fn is_fatal(&self) -> bool {
        self.error_type().is_fatal()
    }
}

impl From<base64::DecodeError> for MocapError {
    fn from(err: base64::DecodeError) -> Self {
        MocapError::Codec(format!("Base64 decode error: {err}"))
    }
}
