//! Total validation of client capture requests.
//!
//! Validation never panics and never loses information: every rejection
//! carries a machine-distinguishable reason and the offending field path.

use thiserror::Error;

use crate::message::{CaptureOptions, CaptureRequest, RequestPayload, MAX_SNAP_LEN};
use crate::target::TargetRequest;

/// Machine-distinguishable reason for a validation rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// A required field or payload was absent.
    NilField,
    /// A required field was present but empty (or zero).
    EmptyField,
    /// The payload or value was of an unexpected shape.
    InvalidPayload,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NilField => "NIL_FIELD",
            Self::EmptyField => "EMPTY_FIELD",
            Self::InvalidPayload => "INVALID_PAYLOAD",
        };
        write!(f, "{name}")
    }
}

/// A validation rejection: the reason plus the field it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid message: {field}: {reason}")]
pub struct ValidationError {
    /// Why the request was rejected.
    pub reason: InvalidReason,
    /// Path of the offending field.
    pub field: &'static str,
}

impl ValidationError {
    fn new(reason: InvalidReason, field: &'static str) -> Self {
        Self { reason, field }
    }
}

/// Validate the first message of a capture stream as a start request.
///
/// On success returns the target request and capture options, both borrowed
/// from `req`. Validation is pure: identical requests yield identical
/// results.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first violated field.
pub fn validate_start(
    req: &CaptureRequest,
) -> Result<(&TargetRequest, &CaptureOptions), ValidationError> {
    let Some(payload) = &req.payload else {
        return Err(ValidationError::new(InvalidReason::NilField, "payload"));
    };

    let RequestPayload::Start(start) = payload else {
        return Err(ValidationError::new(
            InvalidReason::InvalidPayload,
            "payload",
        ));
    };

    let Some(target) = &start.target else {
        return Err(ValidationError::new(InvalidReason::NilField, "target"));
    };

    match target {
        TargetRequest::Vm {
            token,
            deployment,
            groups,
        } => {
            if token.is_empty() {
                return Err(ValidationError::new(InvalidReason::EmptyField, "token"));
            }
            if deployment.is_empty() {
                return Err(ValidationError::new(
                    InvalidReason::EmptyField,
                    "deployment",
                ));
            }
            if groups.is_empty() {
                return Err(ValidationError::new(InvalidReason::EmptyField, "groups"));
            }
        }
        TargetRequest::App { token, app_id, .. } => {
            if token.is_empty() {
                return Err(ValidationError::new(InvalidReason::EmptyField, "token"));
            }
            if app_id.is_empty() {
                return Err(ValidationError::new(InvalidReason::EmptyField, "app_id"));
            }
        }
    }

    let Some(options) = &start.options else {
        return Err(ValidationError::new(InvalidReason::NilField, "options"));
    };
    validate_options(options)?;

    Ok((target, options))
}

/// Validate capture options in isolation.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the device is empty or the snap length
/// is out of range.
pub fn validate_options(options: &CaptureOptions) -> Result<(), ValidationError> {
    if options.device.is_empty() {
        return Err(ValidationError::new(InvalidReason::EmptyField, "device"));
    }
    if options.snap_len == 0 {
        return Err(ValidationError::new(InvalidReason::EmptyField, "snap_len"));
    }
    if options.snap_len > MAX_SNAP_LEN {
        return Err(ValidationError::new(
            InvalidReason::InvalidPayload,
            "snap_len",
        ));
    }
    Ok(())
}
