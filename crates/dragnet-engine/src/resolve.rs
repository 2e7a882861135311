//! Target resolution: turning a client's target request into agent
//! endpoints.

use async_trait::async_trait;
use dragnet_core::{Target, TargetRequest};
use thiserror::Error;

/// Errors produced by a [`TargetResolver`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The platform directory could not answer the query.
    #[error("target resolution failed: {0}")]
    Failed(String),
}

/// Resolves a [`TargetRequest`] to concrete agent endpoints.
///
/// Implementations are platform-specific (VM directors, container
/// schedulers); the engine only depends on this contract. Resolution is pure
/// with respect to the engine: it must not retain or mutate engine state.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Resolve the request to zero or more targets.
    async fn resolve(&self, request: &TargetRequest) -> Result<Vec<Target>, ResolveError>;
}

/// Resolver backed by a fixed target list from the configuration.
///
/// Used when no platform resolver is wired in; every request resolves to the
/// same static agent set.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    targets: Vec<Target>,
}

impl StaticResolver {
    /// Create a resolver that always answers with `targets`.
    #[must_use]
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetResolver for StaticResolver {
    async fn resolve(&self, _request: &TargetRequest) -> Result<Vec<Target>, ResolveError> {
        Ok(self.targets.clone())
    }
}
