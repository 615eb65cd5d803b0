// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Structural validation errors for RemoteFS messages

use crate::messages::{MethodType, ResponsePayload};
use thiserror::Error;

/// Raised before any I/O when a message would violate a wire bound or invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("payload is {len} bytes, limit is {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("listing has {count} entries, limit is {max}")]
    ListingTooLarge { count: usize, max: usize },
    #[error("{actual} payload does not match {expected} request")]
    InvalidPayload {
        expected: MethodType,
        actual: MethodType,
    },
}

/// Raised when bytes received from a peer cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("message has {actual} bytes, expected {expected}")]
    TrailingBytes { expected: usize, actual: usize },
    #[error("unknown method tag {0}")]
    UnknownMethod(u32),
    #[error("unknown status tag {0}")]
    UnknownStatus(u32),
    #[error("unknown object type tag {0}")]
    UnknownObjectType(u32),
    #[error("payload length {0} out of range")]
    InvalidLength(i64),
    #[error("listing count {0} out of range")]
    InvalidCount(u16),
    #[error("name buffer is not NUL-terminated")]
    UnterminatedName,
    #[error("response body {actual} does not match {expected} method tag")]
    BodyMismatch {
        expected: MethodType,
        actual: MethodType,
    },
    #[error("{0} response carried no body")]
    MissingBody(MethodType),
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),
    #[error("SSZ decoding failed: {0}")]
    Ssz(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Reject a payload whose variant disagrees with the tag it travels under.
pub(crate) fn check_payload(expected: MethodType, actual: MethodType) -> Result<(), ValidationError> {
    if actual != expected {
        return Err(ValidationError::InvalidPayload { expected, actual });
    }
    Ok(())
}

/// Reject a response body whose variant disagrees with the response tag.
pub(crate) fn check_body(expected: MethodType, payload: &ResponsePayload) -> Result<(), DecodeError> {
    let actual = payload.method();
    if actual != expected {
        return Err(DecodeError::BodyMismatch { expected, actual });
    }
    Ok(())
}
