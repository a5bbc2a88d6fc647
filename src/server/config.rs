//! Server configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::error::MocapError;
use crate::protocol::{FeatureSet, ServerInfo};

/// Default listen port
pub const DEFAULT_PORT: u16 = 7766;

/// What the server does after a client disconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectBehavior {
    /// Go back to accepting the next client
    #[default]
    RestartAlways,
    /// Stop serving after the first connection ends
    Terminate,
}

impl DisconnectBehavior {
    /// Get the behavior name
    pub fn name(&self) -> &'static str {
        match self {
            Self::RestartAlways => "restart_always",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for DisconnectBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisconnectBehavior {
    type Err = MocapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "restart_always" | "restart" => Ok(Self::RestartAlways),
            "terminate" => Ok(Self::Terminate),
            other => Err(MocapError::Config(format!(
                "unknown disconnect behavior: {other}"
            ))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Policy once the current client goes away
    pub disconnect_behavior: DisconnectBehavior,
    /// Deadline for acknowledgments of server-initiated messages
    pub ack_timeout: Option<Duration>,
    /// How often pending acknowledgments are checked for expiry
    pub ack_poll_interval: Duration,
    /// Maximum frame body size (bytes)
    pub max_frame_size: usize,
    /// Send `SessionStart` as soon as a client connects
    pub initiate_handshake: bool,
    /// Advertised API version and features
    pub server_info: ServerInfo,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            disconnect_behavior: DisconnectBehavior::RestartAlways,
            ack_timeout: Some(Duration::from_secs(5)),
            ack_poll_interval: Duration::from_millis(250),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            initiate_handshake: false,
            server_info: ServerInfo::default(),
        }
    }
}

impl ServerConfig {
    /// Create with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Bind to all interfaces
    pub fn bind_all(mut self) -> Self {
        self.addr.set_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        self
    }

    /// Set address directly
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the disconnect policy
    pub fn with_disconnect_behavior(mut self, behavior: DisconnectBehavior) -> Self {
        self.disconnect_behavior = behavior;
        self
    }

    /// Set the acknowledgment deadline (`None` waits forever)
    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the acknowledgment expiry poll interval
    pub fn with_ack_poll_interval(mut self, interval: Duration) -> Self {
        self.ack_poll_interval = interval;
        self
    }

    /// Set max frame size
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Advertise extra features
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.server_info.features = features;
        self
    }

    /// Set the advertised server description
    pub fn with_server_info(mut self, info: ServerInfo) -> Self {
        self.server_info = info;
        self
    }

    /// Send `SessionStart` on connect instead of waiting for the client
    pub fn with_initiated_handshake(mut self, initiate: bool) -> Self {
        self.initiate_handshake = initiate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ServerConfig::default()
            .with_port(9000)
            .bind_all()
            .with_disconnect_behavior(DisconnectBehavior::Terminate)
            .with_ack_timeout(None);

        assert_eq!(config.addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.disconnect_behavior, DisconnectBehavior::Terminate);
        assert!(config.ack_timeout.is_none());
    }

    #[test]
    fn test_disconnect_behavior_parse() {
        assert_eq!(
            "terminate".parse::<DisconnectBehavior>().unwrap(),
            DisconnectBehavior::Terminate
        );
        assert_eq!(
            "Restart-Always".parse::<DisconnectBehavior>().unwrap(),
            DisconnectBehavior::RestartAlways
        );
        assert!("sometimes".parse::<DisconnectBehavior>().is_err());
    }
}
