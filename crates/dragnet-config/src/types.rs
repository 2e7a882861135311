//! Configuration types.
//!
//! All types are plain serde structs with `#[serde(default)]` so a partial
//! file only overrides what it names. TLS is the one opt-in section: its
//! absence selects plain TCP.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration of the capture API service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listener address and port.
    pub listen: ListenSection,
    /// TLS material; absent disables TLS (local testing only).
    pub tls: Option<TlsSection>,
    /// Forwarder buffer policy.
    pub buffer: BufferSection,
    /// Agent dialing behaviour.
    pub agent: AgentSection,
    /// Static agent targets for the built-in resolver.
    pub agents: Vec<AgentEntry>,
    /// Logging level and format.
    pub log: LogSection,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSection {
    /// Address to bind.
    pub address: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

impl ListenSection {
    /// The `address:port` string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// TLS material paths. Used for both the client-facing listener and the
/// agent-facing dialer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsSection {
    /// Server certificate chain (PEM).
    pub certificate: PathBuf,
    /// Private key for the certificate (PEM).
    pub private_key: PathBuf,
    /// CA bundle peers are verified against (PEM).
    pub ca: PathBuf,
}

/// Forwarder buffer policy. Invariant: `lower_limit < upper_limit <= size`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSection {
    /// Queue depth between the merger and the client writer.
    pub size: usize,
    /// Depth at which new packets start being dropped.
    pub upper_limit: usize,
    /// Depth below which packet delivery is considered recovered.
    pub lower_limit: usize,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            size: 100,
            upper_limit: 95,
            lower_limit: 60,
        }
    }
}

/// Agent dialing behaviour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Bound, in seconds, on dial and status calls during session
    /// establishment.
    pub connect_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

/// One static agent target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Dialable `host:port` address.
    pub address: String,
    /// Identifier used in diagnostics; defaults to the address.
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Machine-readable JSON lines.
    Json,
    /// Human-readable single-line output.
    Compact,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Default level directive (e.g. `info`, `debug`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Json,
        }
    }
}
