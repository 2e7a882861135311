//! Dragnet Wire - Framed transport for the dragnet capture service.
//!
//! The wire format is deliberately small: every message is one frame, a
//! 4-byte big-endian length prefix followed by a JSON payload. Frames keep
//! message boundaries intact over any ordered byte stream, and a write-half
//! shutdown gives the orderly half-close the capture protocol relies on.
//!
//! Transports: plain TCP for local testing, TLS 1.3 with mutual
//! authentication everywhere else.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod frame;
pub mod listen;
pub mod tls;

pub use rustls;

pub use error::{WireError, WireResult};
pub use frame::{BoxedIo, FrameReader, FrameWriter, FramedConnection, MAX_FRAME_LEN};
pub use listen::{dial, Listener};
pub use tls::{client_config, server_config, TlsPaths};
