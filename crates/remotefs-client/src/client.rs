// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Maps filesystem operations onto single request/response exchanges.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, ProtocolMismatch};
use crate::transport::{TcpTransport, Transport};
use remotefs_logging::correlation_id;
use remotefs_proto::{
    Data, DecodeError, Inode, MethodRequest, MethodType, ObjectInfo, ObjectType, Objects,
    ResponsePayload, WireFormat,
};
use tracing::{debug, debug_span, warn};

/// Client for the remote object server.
///
/// Holds no per-call state: every operation encodes a fresh request, performs
/// one transport exchange and discards both messages. Calls from several
/// threads proceed independently.
pub struct RemoteFsClient<T: Transport = TcpTransport> {
    transport: T,
    wire: WireFormat,
}

impl RemoteFsClient<TcpTransport> {
    pub fn from_config(config: &ClientConfig) -> Self {
        let transport = TcpTransport::new(config.endpoint)
            .with_connect_timeout(config.connect_timeout())
            .with_io_timeout(config.io_timeout());
        Self::new(transport, config.wire_format)
    }
}

impl<T: Transport> RemoteFsClient<T> {
    pub fn new(transport: T, wire: WireFormat) -> Self {
        Self { transport, wire }
    }

    pub fn wire_format(&self) -> WireFormat {
        self.wire
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` and return the body of a successful, matching response.
    ///
    /// The method tag is checked before the status: a response for another
    /// method is a protocol mismatch even when it reports an error.
    fn call(&self, request: MethodRequest) -> ClientResult<ResponsePayload> {
        let method = request.method();
        let span = debug_span!(
            "remote_call",
            %method,
            endpoint = %self.transport.endpoint(),
            corr = %correlation_id()
        );
        let _enter = span.enter();

        let bytes = self.wire.encode_request(&request);
        let raw = self.transport.call(&bytes, self.wire.response_framing())?;
        let response = self.wire.decode_response(&raw).map_err(|err| {
            warn!(error = %err, received = raw.len(), "undecodable response");
            ProtocolMismatch::from(err)
        })?;

        if response.method() != method {
            warn!(actual = %response.method(), "response for another method");
            return Err(ProtocolMismatch::MethodTag {
                expected: method,
                actual: response.method(),
            }
            .into());
        }
        if !response.is_ok() {
            debug!("server returned error status");
            return Err(ClientError::Remote { method });
        }
        debug!("ok");
        response
            .into_payload()
            .ok_or_else(|| ProtocolMismatch::Decode(DecodeError::MissingBody(method)).into())
    }

    pub fn lookup(&self, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<ObjectInfo> {
        match self.call(MethodRequest::lookup(parent, name)?)? {
            ResponsePayload::Lookup(info) => Ok(info),
            other => Err(unexpected(MethodType::Lookup, &other)),
        }
    }

    pub fn create(
        &self,
        parent: Inode,
        name: impl AsRef<[u8]>,
        kind: ObjectType,
    ) -> ClientResult<Inode> {
        match self.call(MethodRequest::create(parent, name, kind)?)? {
            ResponsePayload::Create { inode } => Ok(inode),
            other => Err(unexpected(MethodType::Create, &other)),
        }
    }

    pub fn create_file(&self, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<Inode> {
        self.create(parent, name, ObjectType::File)
    }

    pub fn mkdir(&self, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<Inode> {
        self.create(parent, name, ObjectType::Directory)
    }

    /// Non-empty directories are refused by the server, not checked here.
    pub fn rmdir(&self, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<()> {
        self.expect_empty(MethodRequest::rmdir(parent, name)?)
    }

    pub fn link(&self, source: Inode, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<()> {
        self.expect_empty(MethodRequest::link(source, parent, name)?)
    }

    pub fn unlink(&self, parent: Inode, name: impl AsRef<[u8]>) -> ClientResult<()> {
        self.expect_empty(MethodRequest::unlink(parent, name)?)
    }

    /// Whole stored payload; callers slice to the range they need.
    pub fn read(&self, inode: Inode) -> ClientResult<Data> {
        match self.call(MethodRequest::read(inode))? {
            ResponsePayload::Read(data) => Ok(data),
            other => Err(unexpected(MethodType::Read, &other)),
        }
    }

    /// Replace the whole content of `inode` with `bytes`, sent from position 0.
    pub fn write(&self, inode: Inode, bytes: &[u8]) -> ClientResult<()> {
        self.expect_empty(MethodRequest::write(inode, bytes)?)
    }

    /// Up to 32 entries, in the order the server sent them.
    pub fn list(&self, inode: Inode) -> ClientResult<Objects> {
        match self.call(MethodRequest::list(inode))? {
            ResponsePayload::List(objects) => Ok(objects),
            other => Err(unexpected(MethodType::List, &other)),
        }
    }

    /// Ask the server for its root inode.
    pub fn mount(&self) -> ClientResult<Inode> {
        match self.call(MethodRequest::mount())? {
            ResponsePayload::Mount { inode } => Ok(inode),
            other => Err(unexpected(MethodType::Mount, &other)),
        }
    }

    fn expect_empty(&self, request: MethodRequest) -> ClientResult<()> {
        let method = request.method();
        let payload = self.call(request)?;
        match ResponsePayload::empty(method) {
            Some(expected) if expected == payload => Ok(()),
            _ => Err(unexpected(method, &payload)),
        }
    }
}

fn unexpected(expected: MethodType, payload: &ResponsePayload) -> ClientError {
    ProtocolMismatch::MethodTag {
        expected,
        actual: payload.method(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::transport::{MockTransport, TransportError};
    use remotefs_proto::{native, Framing, MethodResponse, Name, Object, ROOT_INODE};
    use std::io;
    use std::net::Ipv4Addr;

    fn mock_replying(response: Vec<u8>) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_endpoint()
            .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
        transport
            .expect_call()
            .times(1)
            .returning(move |_, _| Ok(response.clone()));
        transport
    }

    fn native_client(response: &MethodResponse) -> RemoteFsClient<MockTransport> {
        RemoteFsClient::new(
            mock_replying(native::encode_response(response)),
            WireFormat::Native,
        )
    }

    #[test]
    fn lookup_returns_server_info() {
        let client = native_client(&MethodResponse::ok(ResponsePayload::Lookup(
            ObjectInfo::new(ObjectType::File, 42),
        )));
        assert_eq!(
            client.lookup(ROOT_INODE, "foo").unwrap(),
            ObjectInfo::new(ObjectType::File, 42)
        );
    }

    #[test]
    fn request_bytes_and_framing_follow_wire_format() {
        let mut transport = MockTransport::new();
        transport
            .expect_endpoint()
            .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
        let expected = native::encode_request(&MethodRequest::lookup(ROOT_INODE, "foo").unwrap());
        transport
            .expect_call()
            .withf(move |bytes, framing| {
                bytes == expected.as_slice() && *framing == Framing::Fixed(native::RESPONSE_SIZE)
            })
            .times(1)
            .returning(|_, _| {
                Ok(native::encode_response(&MethodResponse::ok(
                    ResponsePayload::Lookup(ObjectInfo::root()),
                )))
            });
        let client = RemoteFsClient::new(transport, WireFormat::Native);
        assert_eq!(client.lookup(ROOT_INODE, "foo").unwrap(), ObjectInfo::root());
    }

    #[test]
    fn error_status_is_remote_error() {
        let client = native_client(&MethodResponse::err(MethodType::Create));
        let err = client.mkdir(ROOT_INODE, "dup").unwrap_err();
        assert!(err.is_remote(), "{err:?}");
    }

    #[test]
    fn mismatched_tag_is_rejected_for_every_operation() {
        // The server answers every call with an Ok mount response.
        let wrong = native::encode_response(&MethodResponse::ok(ResponsePayload::Mount {
            inode: ROOT_INODE,
        }));
        let client = || {
            let mut transport = MockTransport::new();
            transport
                .expect_endpoint()
                .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
            let wrong = wrong.clone();
            transport
                .expect_call()
                .returning(move |_, _| Ok(wrong.clone()));
            RemoteFsClient::new(transport, WireFormat::Native)
        };
        let results: Vec<ClientResult<()>> = vec![
            client().lookup(ROOT_INODE, "a").map(drop),
            client().create_file(ROOT_INODE, "a").map(drop),
            client().mkdir(ROOT_INODE, "a").map(drop),
            client().rmdir(ROOT_INODE, "a"),
            client().link(5, ROOT_INODE, "a"),
            client().unlink(ROOT_INODE, "a"),
            client().read(5).map(drop),
            client().write(5, b"x"),
            client().list(ROOT_INODE).map(drop),
        ];
        for result in results {
            assert!(
                matches!(
                    result,
                    Err(ClientError::ProtocolMismatch(ProtocolMismatch::MethodTag {
                        actual: MethodType::Mount,
                        ..
                    }))
                ),
                "{result:?}"
            );
        }
    }

    #[test]
    fn mismatched_tag_wins_over_error_status() {
        let client = native_client(&MethodResponse::err(MethodType::Unlink));
        assert!(matches!(
            client.read(7),
            Err(ClientError::ProtocolMismatch(ProtocolMismatch::MethodTag { .. }))
        ));
    }

    #[test]
    fn short_response_is_protocol_mismatch() {
        let full = native::encode_response(&MethodResponse::ok(ResponsePayload::Create {
            inode: 9,
        }));
        let client = RemoteFsClient::new(mock_replying(full[..40].to_vec()), WireFormat::Native);
        assert!(matches!(
            client.create_file(ROOT_INODE, "a"),
            Err(ClientError::ProtocolMismatch(ProtocolMismatch::Decode(
                remotefs_proto::DecodeError::Truncated { .. }
            )))
        ));
    }

    #[test]
    fn validation_happens_before_io() {
        let mut transport = MockTransport::new();
        transport.expect_call().never();
        transport
            .expect_endpoint()
            .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
        let client = RemoteFsClient::new(transport, WireFormat::Native);

        assert!(matches!(
            client.lookup(ROOT_INODE, vec![b'a'; 256]),
            Err(ClientError::Validation(
                remotefs_proto::ValidationError::NameTooLong { .. }
            ))
        ));
        assert!(matches!(
            client.write(42, &[0u8; 1025]),
            Err(ClientError::Validation(
                remotefs_proto::ValidationError::PayloadTooLarge { .. }
            ))
        ));
    }

    #[test]
    fn transport_failure_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_endpoint()
            .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
        transport.expect_call().returning(|_, _| {
            Err(TransportError::Receive {
                source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
            })
        });
        let client = RemoteFsClient::new(transport, WireFormat::Native);
        assert!(matches!(
            client.mount(),
            Err(ClientError::Transport(TransportError::Receive { .. }))
        ));
    }

    #[test]
    fn list_keeps_server_order() {
        let objects = Objects::new(vec![
            Object::new(ObjectInfo::new(ObjectType::File, 50), Name::new("zeta").unwrap()),
            Object::new(
                ObjectInfo::new(ObjectType::Directory, 40),
                Name::new("alpha").unwrap(),
            ),
        ])
        .unwrap();
        let client = native_client(&MethodResponse::ok(ResponsePayload::List(objects)));
        let names: Vec<String> = client
            .list(ROOT_INODE)
            .unwrap()
            .iter()
            .map(|o| o.name.to_string())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn framed_client_uses_prefixed_framing() {
        let mut transport = MockTransport::new();
        transport
            .expect_endpoint()
            .returning(|| Endpoint::new(Ipv4Addr::LOCALHOST, 7000));
        transport
            .expect_call()
            .withf(|_, framing| matches!(framing, Framing::LengthPrefixed { .. }))
            .returning(|_, _| {
                Ok(WireFormat::Framed.encode_response(&MethodResponse::ok(
                    ResponsePayload::Mount { inode: ROOT_INODE },
                )))
            });
        let client = RemoteFsClient::new(transport, WireFormat::Framed);
        assert_eq!(client.mount().unwrap(), ROOT_INODE);
    }
}
