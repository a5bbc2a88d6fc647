//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for `mocap serve`)
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 7766
//! disconnect_behavior = "restart_always"
//!
//! [session]
//! ack_timeout_secs = 5
//!
//! [scene]
//! cameras = ["cam1", "cam2"]
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{MocapError, Result};
use crate::protocol::{FeatureSet, ServerInfo, API_VERSION};
use crate::server::{DisconnectBehavior, ServerConfig, DEFAULT_PORT};

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerSection,

    /// Per-session protocol settings
    #[serde(default)]
    pub session: SessionSection,

    /// Scene served to clients
    #[serde(default)]
    pub scene: SceneSection,
}

impl Config {
    /// Default config file location (`<config dir>/mocap/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mocap").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MocapError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| MocapError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MOCAP_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("MOCAP_PORT") {
            match port.parse() {
                Ok(port) => config.server.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid MOCAP_PORT"),
            }
        }
        if let Ok(secs) = std::env::var("MOCAP_ACK_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => config.session.ack_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid MOCAP_ACK_TIMEOUT_SECS"),
            }
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs
    /// from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let server_defaults = ServerSection::default();
        let session_defaults = SessionSection::default();

        Self {
            server: ServerSection {
                host: pick(self.server.host, other.server.host, &server_defaults.host),
                port: pick(self.server.port, other.server.port, &server_defaults.port),
                disconnect_behavior: pick(
                    self.server.disconnect_behavior,
                    other.server.disconnect_behavior,
                    &server_defaults.disconnect_behavior,
                ),
                initiate_handshake: self.server.initiate_handshake
                    || other.server.initiate_handshake,
                max_frame_size: pick(
                    self.server.max_frame_size,
                    other.server.max_frame_size,
                    &server_defaults.max_frame_size,
                ),
            },
            session: SessionSection {
                ack_timeout_secs: pick(
                    self.session.ack_timeout_secs,
                    other.session.ack_timeout_secs,
                    &session_defaults.ack_timeout_secs,
                ),
                ack_poll_interval_ms: pick(
                    self.session.ack_poll_interval_ms,
                    other.session.ack_poll_interval_ms,
                    &session_defaults.ack_poll_interval_ms,
                ),
                api_version: pick(
                    self.session.api_version,
                    other.session.api_version,
                    &session_defaults.api_version,
                ),
                features: self.session.features | other.session.features,
            },
            scene: if other.scene.cameras.is_empty() {
                self.scene
            } else {
                other.scene
            },
        }
    }

    /// Build the runtime server configuration
    pub fn server_config(&self) -> Result<ServerConfig> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|e| MocapError::Config(format!("invalid host {:?}: {e}", self.server.host)))?;

        let ack_timeout = match self.session.ack_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(ServerConfig::default()
            .with_addr(SocketAddr::new(ip, self.server.port))
            .with_disconnect_behavior(self.server.disconnect_behavior)
            .with_ack_timeout(ack_timeout)
            .with_ack_poll_interval(Duration::from_millis(self.session.ack_poll_interval_ms.max(1)))
            .with_max_frame_size(self.server.max_frame_size)
            .with_server_info(ServerInfo::new(
                &self.session.api_version,
                FeatureSet::from_bits(self.session.features),
            ))
            .with_initiated_handshake(self.server.initiate_handshake))
    }
}

fn pick<T: PartialEq>(base: T, other: T, default: &T) -> T {
    if other != *default {
        other
    } else {
        base
    }
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// What to do once the client disconnects
    pub disconnect_behavior: DisconnectBehavior,

    /// Send `SessionStart` as soon as a client connects
    pub initiate_handshake: bool,

    /// Maximum frame body size in bytes
    pub max_frame_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            disconnect_behavior: DisconnectBehavior::RestartAlways,
            initiate_handshake: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServerSection {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session protocol configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Acknowledgment deadline in seconds (0 disables expiry)
    pub ack_timeout_secs: u64,

    /// How often pending acknowledgments are checked, in milliseconds
    pub ack_poll_interval_ms: u64,

    /// Advertised API version
    pub api_version: String,

    /// Advertised feature bits
    pub features: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ack_timeout_secs: 5,
            ack_poll_interval_ms: 250,
            api_version: API_VERSION.to_string(),
            features: 0,
        }
    }
}

/// Static scene description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSection {
    /// Camera identifiers offered to clients
    pub cameras: Vec<String>,
}
