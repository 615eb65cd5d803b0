// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Object server address

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("endpoint is empty")]
    Empty,
    #[error("endpoint {0:?} has no port (expected <ipv4>:<port>)")]
    MissingPort(String),
    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// IPv4 address and port of the object server.
///
/// The only accepted textual form is `"<ipv4>:<port>"`; host names are not
/// resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(SocketAddrV4);

impl Endpoint {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self(SocketAddrV4::new(ip, port))
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.0
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(s.to_string()))?;
        if port.is_empty() {
            return Err(EndpointParseError::MissingPort(s.to_string()));
        }
        let ip = host
            .parse::<Ipv4Addr>()
            .map_err(|_| EndpointParseError::InvalidAddress(host.to_string()))?;
        let port = match port.parse::<u16>() {
            Ok(0) | Err(_) => return Err(EndpointParseError::InvalidPort(port.to_string())),
            Ok(port) => port,
        };
        Ok(Self::new(ip, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.ip(), self.0.port())
    }
}
