//! Authorization extension points: token verification and the per-tenant
//! feature gate.

use async_trait::async_trait;
use dragnet_core::{TargetRequest, TargetVariant};
use thiserror::Error;

/// A denied verification, with the reason surfaced to the client.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct Denial {
    /// Why the request was denied.
    pub reason: String,
}

impl Denial {
    /// Create a denial with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Verifies the bearer token of a capture request.
///
/// The engine treats tokens as opaque: it hands the token and the request
/// envelope to the verifier and acts only on the verdict.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `token` for `request`.
    async fn verify(&self, token: &str, request: &TargetRequest) -> Result<(), Denial>;
}

/// Decides which tenant variants this deployment serves.
pub trait TenantPolicy: Send + Sync {
    /// Whether captures for `variant` are enabled.
    fn enabled(&self, variant: TargetVariant) -> bool;
}

/// Verifier that accepts every token.
///
/// The production verification predicate is deployment-specific and wired in
/// by the embedding service.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllVerifier;

#[async_trait]
impl TokenVerifier for AllowAllVerifier {
    async fn verify(&self, _token: &str, _request: &TargetRequest) -> Result<(), Denial> {
        Ok(())
    }
}

/// Policy that serves every tenant variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl TenantPolicy for AllowAllPolicy {
    fn enabled(&self, _variant: TargetVariant) -> bool {
        true
    }
}
