//! Value types shared by the wire format and the session state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A three component vector of doubles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vector3 {
    /// All-zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// True when no component is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Position and orientation delta of the tracked device.
///
/// Orientation is expressed as euler angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation in scene units
    pub translation: Vector3,
    /// Orientation as euler angles
    pub orientation: Vector3,
}

impl Transform {
    /// Create a transform from its two components
    pub const fn new(translation: Vector3, orientation: Vector3) -> Self {
        Self {
            translation,
            orientation,
        }
    }

    /// Identity transform (no translation, no rotation)
    pub const fn zero() -> Self {
        Self::new(Vector3::ZERO, Vector3::ZERO)
    }

    /// Convenience constructor from raw component arrays
    pub fn from_components(translation: [f64; 3], orientation: [f64; 3]) -> Self {
        Self::new(
            Vector3::new(translation[0], translation[1], translation[2]),
            Vector3::new(orientation[0], orientation[1], orientation[2]),
        )
    }

    /// True when every component can be carried by the JSON body
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.orientation.is_finite()
    }
}

/// Motion capture mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// No motion is captured
    #[default]
    Off,
    /// Motion drives the scene but is not recorded
    Live,
    /// Motion drives the scene and is recorded
    Recording,
}

impl MotionMode {
    /// Transition table from `self` to the requested mode.
    ///
    /// Returns `None` when the request does not change the mode. Every other
    /// pair is a legal transition.
    pub fn transition(self, requested: MotionMode) -> Option<MotionMode> {
        match (self, requested) {
            (Self::Off, Self::Off)
            | (Self::Live, Self::Live)
            | (Self::Recording, Self::Recording) => None,
            (_, next) => Some(next),
        }
    }

    /// Whether transform updates are accepted in this mode
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Live | Self::Recording)
    }

    /// Whether this mode records
    pub fn is_recording(self) -> bool {
        self == Self::Recording
    }

    /// Get descriptive name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Live => "live",
            Self::Recording => "recording",
        }
    }
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for MotionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "live" => Ok(Self::Live),
            "recording" | "record" => Ok(Self::Recording),
            _ => Err(format!("Unknown motion mode: {s}")),
        }
    }
}

/// A scene camera the client can look through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Camera {
    /// Opaque camera identifier
    pub id: String,
}

impl Camera {
    /// Create a camera with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
