// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! One connection per call: connect, write the whole request, read until the
//! response is complete or the peer closes, shut down.

use crate::endpoint::Endpoint;
use remotefs_proto::Framing;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

const PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },
    #[error("failed to send request: {source}")]
    Send {
        #[source]
        source: io::Error,
    },
    #[error("failed to receive response: {source}")]
    Receive {
        #[source]
        source: io::Error,
    },
}

/// A single request/response exchange with the object server.
///
/// Implementations return the response bytes as received. A peer that closes
/// early yields a short buffer rather than an error; deciding whether the
/// bytes form a complete message is left to the decoder.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn call(&self, request: &[u8], framing: Framing) -> Result<Vec<u8>, TransportError>;

    fn endpoint(&self) -> Endpoint;
}

/// Plain TCP transport. No timeouts unless configured.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: None,
            io_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    fn connect(&self) -> Result<Connection, TransportError> {
        let connect_error = |source| TransportError::Connect {
            endpoint: self.endpoint,
            source,
        };
        let addr = SocketAddr::V4(self.endpoint.addr());
        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(connect_error)?;

        if self.io_timeout.is_some() {
            stream.set_read_timeout(self.io_timeout).map_err(connect_error)?;
            stream.set_write_timeout(self.io_timeout).map_err(connect_error)?;
        }
        Ok(Connection { stream })
    }
}

impl Transport for TcpTransport {
    fn call(&self, request: &[u8], framing: Framing) -> Result<Vec<u8>, TransportError> {
        let mut connection = self.connect()?;
        trace!(endpoint = %self.endpoint, "connected");
        exchange(&mut connection, request, framing)
        // `connection` drops here on every path, shutting the socket down once.
    }

    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

/// Owns the socket for one call.
struct Connection {
    stream: TcpStream,
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            // NotConnected is expected when the peer already went away.
            trace!(error = %err, "socket shutdown");
        }
    }
}

/// Write `request` in full, then read one response framed by `framing`.
pub fn exchange<S: Read + Write>(
    stream: &mut S,
    request: &[u8],
    framing: Framing,
) -> Result<Vec<u8>, TransportError> {
    stream
        .write_all(request)
        .and_then(|_| stream.flush())
        .map_err(|source| TransportError::Send { source })?;
    trace!(bytes = request.len(), "request sent");

    let response = read_frame(stream, framing).map_err(|source| TransportError::Receive { source })?;
    trace!(bytes = response.len(), "response received");
    Ok(response)
}

/// Read one message. Stops early, returning what arrived, if the peer closes.
///
/// For [`Framing::LengthPrefixed`] the returned bytes include the prefix. A
/// prefix announcing more than `max_len` bytes fails with `InvalidData`.
pub fn read_frame<R: Read>(reader: &mut R, framing: Framing) -> io::Result<Vec<u8>> {
    match framing {
        Framing::Fixed(size) => {
            let mut buf = vec![0u8; size];
            let filled = fill(reader, &mut buf)?;
            if filled < size {
                debug!(expected = size, received = filled, "peer closed before full response");
            }
            buf.truncate(filled);
            Ok(buf)
        }
        Framing::LengthPrefixed { max_len } => {
            let mut prefix = [0u8; PREFIX_LEN];
            let filled = fill(reader, &mut prefix)?;
            if filled < PREFIX_LEN {
                debug!(received = filled, "peer closed inside length prefix");
                return Ok(prefix[..filled].to_vec());
            }
            let len = u32::from_le_bytes(prefix) as usize;
            if len > max_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {} bytes exceeds limit of {}", len, max_len),
                ));
            }
            let mut buf = vec![0u8; PREFIX_LEN + len];
            buf[..PREFIX_LEN].copy_from_slice(&prefix);
            let body = fill(reader, &mut buf[PREFIX_LEN..])?;
            if body < len {
                debug!(expected = len, received = body, "peer closed before full frame");
            }
            buf.truncate(PREFIX_LEN + body);
            Ok(buf)
        }
    }
}

/// Read until `buf` is full or end-of-stream; returns the count filled.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Serves queued read results one at a time and records writes.
    struct ScriptedStream {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        fail_write: bool,
    }

    impl ScriptedStream {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                written: Vec::new(),
                fail_write: false,
            }
        }

        fn bytewise(bytes: &[u8]) -> Self {
            Self::new(bytes.iter().map(|b| Ok(vec![*b])).collect())
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.reads.push_front(Ok(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fixed_frame_assembled_from_single_bytes() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(700).collect();
        let mut stream = ScriptedStream::bytewise(&payload);
        let got = read_frame(&mut stream, Framing::Fixed(700)).unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn fixed_frame_stops_at_exact_size() {
        let mut stream = ScriptedStream::new(vec![Ok(vec![1u8; 10])]);
        assert_eq!(read_frame(&mut stream, Framing::Fixed(6)).unwrap(), vec![1u8; 6]);
    }

    #[test]
    fn early_close_returns_short_bytes() {
        let mut stream = ScriptedStream::new(vec![Ok(vec![9u8; 3])]);
        assert_eq!(read_frame(&mut stream, Framing::Fixed(16)).unwrap(), vec![9u8; 3]);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut stream = ScriptedStream::new(vec![
            Ok(vec![1, 2]),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Ok(vec![3, 4]),
        ]);
        assert_eq!(read_frame(&mut stream, Framing::Fixed(4)).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn prefixed_frame_includes_prefix() {
        let mut bytes = 3u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"abcEXTRA");
        let mut stream = ScriptedStream::bytewise(&bytes);
        let got = read_frame(&mut stream, Framing::LengthPrefixed { max_len: 64 }).unwrap();
        assert_eq!(&got[..4], &3u32.to_le_bytes());
        assert_eq!(&got[4..], b"abc");
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        let mut stream = ScriptedStream::new(vec![Ok(1000u32.to_le_bytes().to_vec())]);
        let err = read_frame(&mut stream, Framing::LengthPrefixed { max_len: 64 }).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn exchange_writes_request_then_reads() {
        let mut stream = ScriptedStream::new(vec![Ok(vec![7u8; 8])]);
        let got = exchange(&mut stream, b"request", Framing::Fixed(8)).unwrap();
        assert_eq!(stream.written, b"request");
        assert_eq!(got, vec![7u8; 8]);
    }

    #[test]
    fn exchange_maps_failures_by_phase() {
        let mut stream = ScriptedStream::new(vec![]);
        stream.fail_write = true;
        assert!(matches!(
            exchange(&mut stream, b"x", Framing::Fixed(8)),
            Err(TransportError::Send { .. })
        ));

        let mut stream = ScriptedStream::new(vec![Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        ))]);
        assert!(matches!(
            exchange(&mut stream, b"x", Framing::Fixed(8)),
            Err(TransportError::Receive { .. })
        ));
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        // Bind then drop to find a port that is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new(Endpoint::new(std::net::Ipv4Addr::LOCALHOST, port));
        assert!(matches!(
            transport.call(b"x", Framing::Fixed(4)),
            Err(TransportError::Connect { .. })
        ));
    }
}
