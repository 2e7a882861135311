//! Wire transport errors.

use dragnet_core::{Code, Status};
use thiserror::Error;

/// Errors produced by the framed transport.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame")]
    UnexpectedEof,

    /// A frame length prefix exceeded the per-frame cap.
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = crate::frame::MAX_FRAME_LEN)]
    FrameTooLarge(usize),

    /// A message could not be encoded to JSON.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A frame payload could not be decoded as the expected message.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The remote end reported a terminal status on its trailer.
    #[error("remote error: {0}")]
    Remote(Status),

    /// TLS configuration or handshake failure.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// Certificate material could not be loaded or parsed.
    #[error("invalid certificate material: {0}")]
    Certificate(String),
}

impl WireError {
    /// The transport status code this error maps to.
    ///
    /// Used by the engine to turn transport failures into in-band control
    /// messages with the right kind.
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::Remote(status) => status.code,
            Self::Io(err) => match err.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::TimedOut => Code::Unavailable,
                _ => Code::Unknown,
            },
            Self::UnexpectedEof => Code::Unavailable,
            Self::Encode(_) | Self::Decode(_) | Self::FrameTooLarge(_) => Code::Internal,
            Self::Tls(_) | Self::Certificate(_) => Code::Unknown,
        }
    }
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_mapping() {
        let refused = WireError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(refused.code(), Code::Unavailable);

        let other = WireError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(other.code(), Code::Unknown);
    }

    #[test]
    fn test_remote_status_passes_through() {
        let err = WireError::Remote(Status::new(Code::InvalidArgument, "bad filter"));
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_truncated_stream_is_unavailable() {
        assert_eq!(WireError::UnexpectedEof.code(), Code::Unavailable);
    }
}
