//! Dragnet Test - Test support for the dragnet capture service.
//!
//! Provides [`MockAgent`], a scripted capture agent speaking the real wire
//! protocol on a real socket, so integration tests can exercise the full
//! dial / status / start / stream / stop sequence without libpcap.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod agent;

pub use agent::{MockAgent, MockAgentHandle};
