// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::transport::TransportError;
use remotefs_proto::{DecodeError, MethodType, ValidationError};
use thiserror::Error;

/// The response did not answer the request that was sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMismatch {
    #[error("response tagged {actual} for a {expected} request")]
    MethodTag {
        expected: MethodType,
        actual: MethodType,
    },
    #[error("undecodable response: {0}")]
    Decode(#[from] DecodeError),
}

/// Failure of one remote operation. Every variant is terminal for its call.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with status `Err`. Not-found and server faults are
    /// indistinguishable here.
    #[error("server rejected {method} request")]
    Remote { method: MethodType },

    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(#[from] ProtocolMismatch),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn is_remote(&self) -> bool {
        matches!(self, ClientError::Remote { .. })
    }

    /// Coarse errno for a filesystem boundary.
    pub fn errno(&self) -> i32 {
        match self {
            ClientError::Validation(ValidationError::NameTooLong { .. }) => libc::ENAMETOOLONG,
            ClientError::Validation(ValidationError::PayloadTooLarge { .. }) => libc::EFBIG,
            ClientError::Validation(ValidationError::InvalidName(_)) => libc::EINVAL,
            ClientError::Validation(_) => libc::EIO,
            ClientError::Transport(_) | ClientError::Remote { .. } => libc::EIO,
            ClientError::ProtocolMismatch(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        let too_long = ClientError::from(ValidationError::NameTooLong { len: 300, max: 255 });
        assert_eq!(too_long.errno(), libc::ENAMETOOLONG);

        let too_big = ClientError::from(ValidationError::PayloadTooLarge {
            len: 2000,
            max: 1024,
        });
        assert_eq!(too_big.errno(), libc::EFBIG);

        let remote = ClientError::Remote {
            method: MethodType::Create,
        };
        assert!(remote.is_remote());
        assert_eq!(remote.errno(), libc::EIO);

        let mismatch = ClientError::from(ProtocolMismatch::MethodTag {
            expected: MethodType::Read,
            actual: MethodType::Write,
        });
        assert_eq!(mismatch.errno(), libc::EIO);
        assert_eq!(
            mismatch.to_string(),
            "protocol mismatch: response tagged write for a read request"
        );
    }
}
