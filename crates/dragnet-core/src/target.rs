//! Capture target requests and resolved agent endpoints.

use serde::{Deserialize, Serialize};

/// A client's description of what to capture from.
///
/// Tokens are opaque bearer credentials; the engine forwards them to the
/// token verifier without inspecting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetRequest {
    /// Capture from the instances of one or more VM instance groups.
    Vm {
        /// Bearer credential for the target platform.
        #[serde(default)]
        token: String,
        /// Deployment name.
        #[serde(default)]
        deployment: String,
        /// Instance groups to capture from (at least one).
        #[serde(default)]
        groups: Vec<String>,
    },
    /// Capture from the instances of a platform application.
    App {
        /// Bearer credential for the target platform.
        #[serde(default)]
        token: String,
        /// Application identifier.
        #[serde(default)]
        app_id: String,
        /// Optional restriction to specific instance indices.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        indices: Option<Vec<i32>>,
    },
}

impl TargetRequest {
    /// The bearer token carried by the request.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Vm { token, .. } | Self::App { token, .. } => token,
        }
    }

    /// The tenant variant of this request.
    #[must_use]
    pub fn variant(&self) -> TargetVariant {
        match self {
            Self::Vm { .. } => TargetVariant::Vm,
            Self::App { .. } => TargetVariant::App,
        }
    }
}

/// Tenant variant of a [`TargetRequest`], used by the tenant policy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVariant {
    /// VM deployment / instance-group tenants.
    Vm,
    /// Platform-container application tenants.
    App,
}

impl std::fmt::Display for TargetVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vm => write!(f, "vm"),
            Self::App => write!(f, "app"),
        }
    }
}

/// A resolved capture agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Dialable `host:port` address of the agent.
    pub address: String,
    /// Agent identity used for per-source attribution and diagnostics.
    pub identifier: String,
}

impl Target {
    /// Create a target from an address and identifier.
    pub fn new(address: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identifier: identifier.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_and_variant() {
        let vm = TargetRequest::Vm {
            token: "t".into(),
            deployment: "cf".into(),
            groups: vec!["router".into()],
        };
        assert_eq!(vm.token(), "t");
        assert_eq!(vm.variant(), TargetVariant::Vm);

        let app = TargetRequest::App {
            token: "u".into(),
            app_id: "123abc".into(),
            indices: None,
        };
        assert_eq!(app.token(), "u");
        assert_eq!(app.variant(), TargetVariant::App);
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(TargetVariant::Vm.to_string(), "vm");
        assert_eq!(TargetVariant::App.to_string(), "app");
    }
}
