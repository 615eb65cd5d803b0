// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wire format selection

use crate::messages::{MethodRequest, MethodResponse};
use crate::validation::DecodeError;
use crate::{framed, native};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a transport knows where a message ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Exactly this many bytes, or fewer if the peer closes early.
    Fixed(usize),
    /// A little-endian `u32` length prefix followed by at most `max_len` bytes.
    LengthPrefixed { max_len: usize },
}

/// Encoding used on the connection. Both peers must agree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Fixed-size C struct layout understood by the reference server.
    #[default]
    Native,
    /// Versioned, length-prefixed SSZ envelope.
    Framed,
}

impl WireFormat {
    pub fn encode_request(self, request: &MethodRequest) -> Vec<u8> {
        match self {
            WireFormat::Native => native::encode_request(request),
            WireFormat::Framed => framed::encode_request(request),
        }
    }

    pub fn decode_request(self, buf: &[u8]) -> Result<MethodRequest, DecodeError> {
        match self {
            WireFormat::Native => native::decode_request(buf),
            WireFormat::Framed => framed::decode_request(buf),
        }
    }

    pub fn encode_response(self, response: &MethodResponse) -> Vec<u8> {
        match self {
            WireFormat::Native => native::encode_response(response),
            WireFormat::Framed => framed::encode_response(response),
        }
    }

    pub fn decode_response(self, buf: &[u8]) -> Result<MethodResponse, DecodeError> {
        match self {
            WireFormat::Native => native::decode_response(buf),
            WireFormat::Framed => framed::decode_response(buf),
        }
    }

    pub fn request_framing(self) -> Framing {
        match self {
            WireFormat::Native => Framing::Fixed(native::REQUEST_SIZE),
            WireFormat::Framed => Framing::LengthPrefixed {
                max_len: framed::MAX_FRAME_LEN,
            },
        }
    }

    pub fn response_framing(self) -> Framing {
        match self {
            WireFormat::Native => Framing::Fixed(native::RESPONSE_SIZE),
            WireFormat::Framed => Framing::LengthPrefixed {
                max_len: framed::MAX_FRAME_LEN,
            },
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::Native => write!(f, "native"),
            WireFormat::Framed => write!(f, "framed"),
        }
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(WireFormat::Native),
            "framed" => Ok(WireFormat::Framed),
            other => Err(format!(
                "invalid wire format: {other} (expected native or framed)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Framed".parse::<WireFormat>(), Ok(WireFormat::Framed));
        assert_eq!("native".parse::<WireFormat>(), Ok(WireFormat::Native));
        assert!("json".parse::<WireFormat>().is_err());
    }

    #[test]
    fn native_framing_is_fixed() {
        assert_eq!(
            WireFormat::Native.response_framing(),
            Framing::Fixed(native::RESPONSE_SIZE)
        );
        assert_eq!(WireFormat::default(), WireFormat::Native);
    }
}
