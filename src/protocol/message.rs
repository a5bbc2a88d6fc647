//! Protocol envelopes exchanged between the server and a client device.
//!
//! Every unit on the wire is an [`Envelope`]: a header carrying the message
//! id (and, for replies, the id being answered) plus exactly one [`Payload`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::capabilities::{ServerInfo, SessionProperties};
use super::types::{Camera, MotionMode, Transform};
use crate::error::MocapError;

/// Message identifier (UUID v4 string for server generated messages)
pub type MessageId = String;

/// Envelope header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Unique id of this message
    pub id: MessageId,
    /// Id of the message this one answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<MessageId>,
}

/// Protocol message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Addressing information
    pub header: Header,
    /// Message payload; `None` marks a malformed message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

/// Message payload variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Session handshake, carries the server description
    SessionStart {
        /// Server API version and features
        #[serde(default)]
        server_info: ServerInfo,
    },
    /// Client accepts the session
    SessionActivate {
        /// Client description
        #[serde(default)]
        properties: SessionProperties,
    },
    /// Session termination
    SessionShutdown {},
    /// Receipt of a previous message (see [`Header::response_id`])
    Acknowledge {},
    /// Error report
    Error(ErrorPayload),
    /// Request the available cameras
    GetCameraList {},
    /// Available cameras
    CameraList {
        /// Cameras in delegate order
        cameras: Vec<Camera>,
    },
    /// Select the camera driven by motion updates
    SetActiveCamera {
        /// Id of the camera to activate
        camera_id: String,
    },
    /// Camera that is now active
    ActiveCameraInfo {
        /// The active camera
        camera: Camera,
    },
    /// Change the capture mode
    MotionSetMode {
        /// Requested mode
        mode: MotionMode,
    },
    /// Request the capture mode
    MotionGetMode {},
    /// Current capture mode
    MotionActiveMode {
        /// Current mode
        mode: MotionMode,
    },
    /// Transform telemetry from the device
    #[serde(rename = "motion_xform")]
    MotionUpdateXForm {
        /// Latest device transform
        xform: Transform,
    },
    /// Server report of the current motion state
    MotionInfo {
        /// Current mode
        mode: MotionMode,
        /// Last accepted transform
        xform: Transform,
    },
}

/// Fieldless mirror of [`Payload`] used for logging and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PayloadKind {
    SessionStart,
    SessionActivate,
    SessionShutdown,
    Acknowledge,
    Error,
    GetCameraList,
    CameraList,
    SetActiveCamera,
    ActiveCameraInfo,
    MotionSetMode,
    MotionGetMode,
    MotionActiveMode,
    MotionUpdateXForm,
    MotionInfo,
}

impl PayloadKind {
    /// Wire name of the payload kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionActivate => "session_activate",
            Self::SessionShutdown => "session_shutdown",
            Self::Acknowledge => "acknowledge",
            Self::Error => "error",
            Self::GetCameraList => "get_camera_list",
            Self::CameraList => "camera_list",
            Self::SetActiveCamera => "set_active_camera",
            Self::ActiveCameraInfo => "active_camera_info",
            Self::MotionSetMode => "motion_set_mode",
            Self::MotionGetMode => "motion_get_mode",
            Self::MotionActiveMode => "motion_active_mode",
            Self::MotionUpdateXForm => "motion_xform",
            Self::MotionInfo => "motion_info",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Payload {
    /// Kind of this payload
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::SessionStart { .. } => PayloadKind::SessionStart,
            Self::SessionActivate { .. } => PayloadKind::SessionActivate,
            Self::SessionShutdown {} => PayloadKind::SessionShutdown,
            Self::Acknowledge {} => PayloadKind::Acknowledge,
            Self::Error(_) => PayloadKind::Error,
            Self::GetCameraList {} => PayloadKind::GetCameraList,
            Self::CameraList { .. } => PayloadKind::CameraList,
            Self::SetActiveCamera { .. } => PayloadKind::SetActiveCamera,
            Self::ActiveCameraInfo { .. } => PayloadKind::ActiveCameraInfo,
            Self::MotionSetMode { .. } => PayloadKind::MotionSetMode,
            Self::MotionGetMode {} => PayloadKind::MotionGetMode,
            Self::MotionActiveMode { .. } => PayloadKind::MotionActiveMode,
            Self::MotionUpdateXForm { .. } => PayloadKind::MotionUpdateXForm,
            Self::MotionInfo { .. } => PayloadKind::MotionInfo,
        }
    }

    /// Transform carried by this payload, if any
    pub fn transform(&self) -> Option<&Transform> {
        match self {
            Self::MotionUpdateXForm { xform } | Self::MotionInfo { xform, .. } => Some(xform),
            _ => None,
        }
    }
}

/// Error categories reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Payload missing or unreadable
    MalformedMessage,
    /// Message violates the protocol
    InvalidMessage,
    /// Message understood but could not be carried out
    CannotProcessMessage,
    /// Session must be activated first
    SessionNotActive,
    /// Requested API version unsupported (fatal)
    ApiVersionNotSupported,
    /// No handler for the payload kind
    ApplicationException,
    /// Unmapped internal fault (fatal)
    UnexpectedError,
}

impl ErrorType {
    /// Wire string for this error type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedMessage => "MalformedMessageError",
            Self::InvalidMessage => "InvalidMessage",
            Self::CannotProcessMessage => "CannotProcessMessage",
            Self::SessionNotActive => "SessionNotActiveError",
            Self::ApiVersionNotSupported => "APIVersionNotSupportedError",
            Self::ApplicationException => "ApplicationException",
            Self::UnexpectedError => "UnexpectedError",
        }
    }

    /// Whether the session is shut down after reporting this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ApiVersionNotSupported | Self::UnexpectedError)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MalformedMessageError" => Ok(Self::MalformedMessage),
            "InvalidMessage" => Ok(Self::InvalidMessage),
            "CannotProcessMessage" => Ok(Self::CannotProcessMessage),
            "SessionNotActiveError" => Ok(Self::SessionNotActive),
            "APIVersionNotSupportedError" => Ok(Self::ApiVersionNotSupported),
            "ApplicationException" => Ok(Self::ApplicationException),
            "UnexpectedError" => Ok(Self::UnexpectedError),
            _ => Err(format!("Unknown error type: {s}")),
        }
    }
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error type string (see [`ErrorType::as_str`])
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message
    pub message: String,
    /// The sender shut the session down after this error
    #[serde(default)]
    pub is_fatal: bool,
}

impl ErrorPayload {
    /// Create an error payload for a known error type
    pub fn new(error_type: ErrorType, message: &str) -> Self {
        Self {
            error_type: error_type.as_str().to_string(),
            message: message.to_string(),
            is_fatal: error_type.is_fatal(),
        }
    }

    /// Parse the error type, if it is one this crate knows
    pub fn kind(&self) -> Option<ErrorType> {
        self.error_type.parse().ok()
    }
}

impl From<&MocapError> for ErrorPayload {
    fn from(err: &MocapError) -> Self {
        Self::new(err.error_type(), &err.to_string())
    }
}

impl Envelope {
    /// Create a message with a fresh id
    pub fn new(payload: Payload) -> Self {
        Self {
            header: Header {
                id: new_message_id(),
                response_id: None,
            },
            payload: Some(payload),
        }
    }

    /// Create a reply to the message with id `response_id`
    pub fn reply(response_id: &str, payload: Payload) -> Self {
        Self {
            header: Header {
                id: new_message_id(),
                response_id: Some(response_id.to_string()),
            },
            payload: Some(payload),
        }
    }

    /// Create an error reply; `response_id` is `None` when the offending id is unknown
    pub fn error(response_id: Option<&str>, error: ErrorPayload) -> Self {
        Self {
            header: Header {
                id: new_message_id(),
                response_id: response_id.map(str::to_string),
            },
            payload: Some(Payload::Error(error)),
        }
    }

    /// Create an envelope with an explicit id (mostly useful for clients and tests)
    pub fn with_id(id: &str, payload: Option<Payload>) -> Self {
        Self {
            header: Header {
                id: id.to_string(),
                response_id: None,
            },
            payload,
        }
    }

    /// Set the id this envelope answers
    pub fn in_response_to(mut self, response_id: &str) -> Self {
        self.header.response_id = Some(response_id.to_string());
        self
    }

    /// Message id
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Id of the answered message, if any
    pub fn response_id(&self) -> Option<&str> {
        self.header.response_id.as_deref()
    }

    /// Kind of the payload, if present
    pub fn kind(&self) -> Option<PayloadKind> {
        self.payload.as_ref().map(Payload::kind)
    }

    /// Get error payload
    pub fn get_error(&self) -> Option<&ErrorPayload> {
        match &self.payload {
            Some(Payload::Error(err)) => Some(err),
            _ => None,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Generate a new globally unique message id
pub fn new_message_id() -> MessageId {
    uuid::Uuid::new_v4().to_string()
}
