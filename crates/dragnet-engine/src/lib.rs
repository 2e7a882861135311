//! Dragnet Engine - The capture fan-out engine.
//!
//! One [`CaptureEngine::capture`] call drives a single client stream:
//! validate the start request, resolve it to agent targets, establish one
//! session per agent, merge the per-agent response streams into one bounded
//! output, forward it to the client, and coordinate clean shutdown on client
//! stop, client disconnect, agent failure, or unrecoverable error.
//!
//! The engine is transport-agnostic at both boundaries: the client stream is
//! a [`RequestSource`]/[`ResponseSink`] pair and agents are reached through
//! an [`AgentDialer`]. `dragnet-wire` provides the production
//! implementations; tests substitute scripted ones.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod auth;
pub mod capture;
pub mod dialer;
pub mod forward;
mod merge;
pub mod resolve;
pub mod scope;
pub mod session;
pub mod stream;
mod watch;

pub use auth::{AllowAllPolicy, AllowAllVerifier, Denial, TenantPolicy, TokenVerifier};
pub use capture::CaptureEngine;
pub use dialer::{AgentConnection, AgentDialer, WireDialer};
pub use forward::BufferPolicy;
pub use resolve::{ResolveError, StaticResolver, TargetResolver};
pub use scope::CancelScope;
pub use session::SessionState;
pub use stream::{FramedRequestSource, FramedResponseSink, RequestSource, ResponseSink};
