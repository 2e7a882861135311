//! Dragnet Core - Shared message schemas for the dragnet capture service.
//!
//! This crate provides:
//! - Wire message types exchanged with clients and capture agents
//! - Terminal status codes carried on stream trailers
//! - Total request validation with typed failure reasons
//! - Resolved target types and the agent compatibility constant
//!
//! Everything here is plain data: no I/O, no async. The wire and engine
//! crates layer transport and behavior on top.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod message;
pub mod status;
pub mod target;
pub mod validate;

pub use message::{
    AgentFrame, AgentRequest, CaptureOptions, CaptureRequest, CaptureResponse, ClientFrame,
    ControlMessage, MessageKind, Packet, RequestPayload, StartCapture, StatusResponse,
    MAX_SNAP_LEN, MIN_COMPATIBILITY,
};
pub use status::{Code, Status};
pub use target::{Target, TargetRequest, TargetVariant};
pub use validate::{validate_options, validate_start, InvalidReason, ValidationError};
