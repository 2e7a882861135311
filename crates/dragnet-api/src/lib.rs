//! Dragnet API - The capture API service.
//!
//! Thin service shell around `dragnet-engine`: a listener accepting framed
//! client streams, logging setup, and graceful shutdown. The binary in
//! `main.rs` adds the CLI and signal handling.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod logging;
pub mod server;

pub use server::{Server, ServerError};
