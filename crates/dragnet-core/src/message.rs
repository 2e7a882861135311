//! Wire message types for the client and agent capture protocols.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::Status;
use crate::target::TargetRequest;

/// Minimum agent compatibility level this build will talk to.
///
/// Agents report their level in [`StatusResponse::compatibility_level`];
/// anything below this constant is rejected at session establishment.
pub const MIN_COMPATIBILITY: i64 = 1;

/// Largest accepted `snap_len` in [`CaptureOptions`].
pub const MAX_SNAP_LEN: u32 = 65_535;

/// Per-capture options forwarded verbatim to every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Network device to capture on.
    pub device: String,
    /// BPF filter expression. May be empty.
    #[serde(default)]
    pub filter: String,
    /// Snap length in bytes, `1..=65535`.
    pub snap_len: u32,
}

/// Payload of a client request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    /// Begin a capture.
    Start(StartCapture),
    /// Stop the running capture.
    Stop,
}

/// Client request envelope.
///
/// `payload` is optional to mirror the nullable message fields of the wire
/// protocol; validation turns an absent payload into a typed rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// The request payload, if any.
    #[serde(default)]
    pub payload: Option<RequestPayload>,
}

impl CaptureRequest {
    /// A well-formed start request.
    #[must_use]
    pub fn start(target: TargetRequest, options: CaptureOptions) -> Self {
        Self {
            payload: Some(RequestPayload::Start(StartCapture {
                target: Some(target),
                options: Some(options),
            })),
        }
    }

    /// A stop request.
    #[must_use]
    pub fn stop() -> Self {
        Self {
            payload: Some(RequestPayload::Stop),
        }
    }
}

/// Body of a start request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCapture {
    /// What to capture from.
    #[serde(default)]
    pub target: Option<TargetRequest>,
    /// How to capture.
    #[serde(default)]
    pub options: Option<CaptureOptions>,
}

/// Kind discriminator of an in-band control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Agent confirmed the capture started.
    Started,
    /// Capture on one agent ended gracefully.
    Stopped,
    /// A session could not be established for one target.
    FailedToStart,
    /// The agent rejected the capture request.
    InvalidRequest,
    /// The agent connection went away mid-capture.
    InstanceDisconnected,
    /// Unclassified transport failure on an agent connection.
    ConnectionError,
    /// Agent-side capture limit was reached.
    LimitReached,
    /// The service is dropping packets for this client.
    Congested,
    /// Packet delivery resumed after congestion.
    Resumed,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::FailedToStart => "FAILED_TO_START",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InstanceDisconnected => "INSTANCE_DISCONNECTED",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::LimitReached => "LIMIT_REACHED",
            Self::Congested => "CONGESTED",
            Self::Resumed => "RESUMED",
        };
        write!(f, "{name}")
    }
}

/// A single captured frame with its agent-side timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Raw frame bytes, truncated to the capture snap length.
    pub data: Vec<u8>,
    /// Agent-side capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the agent that captured the frame.
    #[serde(default)]
    pub source: String,
}

/// An in-band control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Message kind.
    pub kind: MessageKind,
    /// Human-readable detail.
    pub text: String,
}

/// One element of the merged capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureResponse {
    /// A captured frame.
    Packet(Packet),
    /// A control message.
    Message(ControlMessage),
}

impl CaptureResponse {
    /// Build a control message response.
    pub fn message(kind: MessageKind, text: impl Into<String>) -> Self {
        Self::Message(ControlMessage {
            kind,
            text: text.into(),
        })
    }

    /// Whether this response is a packet (droppable under congestion).
    #[must_use]
    pub fn is_packet(&self) -> bool {
        matches!(self, Self::Packet(_))
    }
}

/// Request sent from the API to a capture agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentRequest {
    /// Ask for health and compatibility before starting.
    Status,
    /// Begin capturing with the given options.
    Start {
        /// Capture options for the agent.
        options: CaptureOptions,
    },
    /// Cooperatively stop the running capture.
    Stop,
}

/// Agent health and compatibility report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the agent considers itself able to capture.
    pub healthy: bool,
    /// Wire-protocol generation of the agent.
    pub compatibility_level: i64,
    /// Optional diagnostic detail.
    #[serde(default)]
    pub message: String,
}

/// Server-to-client frame envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ClientFrame {
    /// An element of the merged capture stream.
    Response(CaptureResponse),
    /// Terminal status; the stream closes right after.
    Trailer(Status),
}

/// Agent-to-API frame envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum AgentFrame {
    /// Reply to [`AgentRequest::Status`].
    Status(StatusResponse),
    /// An element of the agent's capture stream.
    Response(CaptureResponse),
    /// Terminal error; the agent closes the stream right after.
    Trailer(Status),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    #[test]
    fn test_request_payload_tags() {
        let start = CaptureRequest::start(
            TargetRequest::Vm {
                token: "t".into(),
                deployment: "cf".into(),
                groups: vec!["router".into()],
            },
            CaptureOptions {
                device: "en0".into(),
                filter: String::new(),
                snap_len: 65_000,
            },
        );
        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["payload"]["type"], "start");
        assert_eq!(json["payload"]["target"]["type"], "vm");

        let stop = serde_json::to_value(CaptureRequest::stop()).unwrap();
        assert_eq!(stop["payload"]["type"], "stop");
    }

    #[test]
    fn test_empty_envelope_deserializes() {
        let req: CaptureRequest = serde_json::from_str("{}").unwrap();
        assert!(req.payload.is_none());
    }

    #[test]
    fn test_client_frame_trailer_shape() {
        let frame = ClientFrame::Trailer(Status::new(Code::Ok, ""));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["frame"], "trailer");
        assert_eq!(json["code"], "OK");

        let back: ClientFrame = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_message_kind_display_matches_wire_name() {
        assert_eq!(MessageKind::FailedToStart.to_string(), "FAILED_TO_START");
        let json = serde_json::to_value(MessageKind::FailedToStart).unwrap();
        assert_eq!(json, "FAILED_TO_START");
    }
}
