// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client side of the RemoteFS object server protocol.
//!
//! Each filesystem operation becomes one independent exchange: a fresh TCP
//! connection, one request written in full, one response read until complete
//! or until the peer closes, then the connection is shut down. Nothing is
//! shared between calls.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod transport;
pub mod vfs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::RemoteFsClient;
pub use config::{ClientConfig, WIRE_FORMAT_ENV};
pub use endpoint::{Endpoint, EndpointParseError};
pub use error::{ClientError, ClientResult, ProtocolMismatch};
pub use transport::{exchange, read_frame, TcpTransport, Transport, TransportError};
pub use vfs::VfsOperations;
