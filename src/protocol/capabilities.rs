//! Server and client capabilities exchanged during session setup.
//!
//! The server advertises a [`ServerInfo`] in its `SessionStart` envelope;
//! the client answers with [`SessionProperties`] in `SessionActivate`.
//! The API version major component must match for the session to proceed.

use serde::{Deserialize, Serialize};

/// Optional server feature bits advertised in [`ServerInfo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(u32);

impl FeatureSet {
    /// Server can stream video to the client
    pub const VIDEO_STREAMING: u32 = 1 << 0;
    /// Server keeps recorded track history
    pub const TRACK_HISTORY: u32 = 1 << 1;
    /// Server exposes custom controls
    pub const CUSTOM_CONTROLS: u32 = 1 << 2;

    /// Create an empty feature set
    pub fn new() -> Self {
        Self(0)
    }

    /// Create from raw bits
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Set a feature bit
    pub fn set(&mut self, feature: u32) {
        self.0 |= feature;
    }

    /// Builder-style variant of [`FeatureSet::set`]
    pub fn with(mut self, feature: u32) -> Self {
        self.set(feature);
        self
    }

    /// Check if a feature bit is set
    pub fn has(&self, feature: u32) -> bool {
        self.0 & feature != 0
    }
}

/// Server description sent with `SessionStart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// API version spoken by the server
    pub api_version: String,
    /// Supported optional features
    pub features: FeatureSet,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            api_version: super::API_VERSION.to_string(),
            features: FeatureSet::new(),
        }
    }
}

impl ServerInfo {
    /// Create server info with explicit features
    pub fn new(api_version: &str, features: FeatureSet) -> Self {
        Self {
            api_version: api_version.to_string(),
            features,
        }
    }

    /// Check whether a peer API version can talk to this server.
    ///
    /// Only the major component has to match.
    pub fn is_compatible(&self, api_version: &str) -> bool {
        major(&self.api_version) == major(api_version)
    }
}

/// Client description carried by `SessionActivate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProperties {
    /// Human readable client name
    #[serde(default)]
    pub name: String,
    /// API version the client speaks (empty = unspecified)
    #[serde(default)]
    pub api_version: String,
    /// Features the client wants to use
    #[serde(default)]
    pub features: FeatureSet,
}

impl SessionProperties {
    /// Create properties for a named client
    pub fn new(name: &str, api_version: &str) -> Self {
        Self {
            name: name.to_string(),
            api_version: api_version.to_string(),
            features: FeatureSet::new(),
        }
    }
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or("0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_bits() {
        let features = FeatureSet::new()
            .with(FeatureSet::VIDEO_STREAMING)
            .with(FeatureSet::CUSTOM_CONTROLS);

        assert!(features.has(FeatureSet::VIDEO_STREAMING));
        assert!(!features.has(FeatureSet::TRACK_HISTORY));
        assert_eq!(features.bits(), 0b101);
    }

    #[test]
    fn test_version_compatibility() {
        let info = ServerInfo::default();
        assert!(info.is_compatible("1.0"));
        assert!(info.is_compatible("1.4")); // Minor version diff OK
        assert!(!info.is_compatible("2.0")); // Major version diff NOT OK
    }

    #[test]
    fn test_default_server_info() {
        let info = ServerInfo::default();
        assert_eq!(info.api_version, super::super::API_VERSION);
        assert_eq!(info.features.bits(), 0);
    }
}
