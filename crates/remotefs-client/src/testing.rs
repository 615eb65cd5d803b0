// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test doubles for the object server: an in-memory store, a TCP server that
//! speaks either wire format, and a loopback transport that skips the socket.

use crate::client::RemoteFsClient;
use crate::endpoint::Endpoint;
use crate::transport::{read_frame, Transport, TransportError};
use remotefs_proto::{
    Data, EntryRequest, Framing, Inode, MethodRequest, MethodResponse, Name, Object, ObjectInfo,
    ObjectType, Objects, RequestPayload, ResponsePayload, WireFormat, MAX_OBJECTS, ROOT_INODE,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug)]
enum Node {
    File(Vec<u8>),
    Directory(Vec<(Name, Inode)>),
}

/// Object server state: a root directory at 1337 and sequential inodes.
///
/// Entries keep insertion order, so listings come back in creation order.
/// Duplicate names, non-empty rmdir and reads of directories all fail with
/// status `Err`, as the reference server does.
#[derive(Debug)]
pub struct ObjectStore {
    nodes: HashMap<Inode, Node>,
    next_inode: Inode,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_INODE, Node::Directory(Vec::new()));
        Self {
            nodes,
            next_inode: ROOT_INODE + 1,
        }
    }

    pub fn handle(&mut self, request: &MethodRequest) -> MethodResponse {
        match self.apply(request.payload()) {
            Some(payload) => MethodResponse::ok(payload),
            None => MethodResponse::err(request.method()),
        }
    }

    pub fn kind(&self, inode: Inode) -> Option<ObjectType> {
        self.nodes.get(&inode).map(|node| match node {
            Node::File(_) => ObjectType::File,
            Node::Directory(_) => ObjectType::Directory,
        })
    }

    /// Number of live objects, root included.
    pub fn object_count(&self) -> usize {
        self.nodes.len()
    }

    fn entries(&self, dir: Inode) -> Option<&Vec<(Name, Inode)>> {
        match self.nodes.get(&dir)? {
            Node::Directory(entries) => Some(entries),
            Node::File(_) => None,
        }
    }

    fn entries_mut(&mut self, dir: Inode) -> Option<&mut Vec<(Name, Inode)>> {
        match self.nodes.get_mut(&dir)? {
            Node::Directory(entries) => Some(entries),
            Node::File(_) => None,
        }
    }

    fn find(&self, parent: Inode, name: &Name) -> Option<Inode> {
        self.entries(parent)?
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, inode)| *inode)
    }

    fn add_entry(&mut self, parent: Inode, name: &Name, inode: Inode) -> Option<()> {
        if self.find(parent, name).is_some() {
            return None;
        }
        self.entries_mut(parent)?.push((name.clone(), inode));
        Some(())
    }

    fn remove_entry(&mut self, entry: &EntryRequest) -> Option<Inode> {
        let entries = self.entries_mut(entry.parent)?;
        let index = entries.iter().position(|(name, _)| *name == entry.name)?;
        Some(entries.remove(index).1)
    }

    fn is_referenced(&self, inode: Inode) -> bool {
        self.nodes.values().any(|node| match node {
            Node::Directory(entries) => entries.iter().any(|(_, child)| *child == inode),
            Node::File(_) => false,
        })
    }

    fn apply(&mut self, payload: &RequestPayload) -> Option<ResponsePayload> {
        match payload {
            RequestPayload::Create(create) => {
                self.entries(create.parent)?;
                let inode = self.next_inode;
                self.add_entry(create.parent, &create.name, inode)?;
                self.next_inode += 1;
                let node = match create.kind {
                    ObjectType::File => Node::File(Vec::new()),
                    ObjectType::Directory => Node::Directory(Vec::new()),
                };
                self.nodes.insert(inode, node);
                Some(ResponsePayload::Create { inode })
            }
            RequestPayload::Link(link) => {
                if self.kind(link.source)? != ObjectType::File {
                    return None;
                }
                self.add_entry(link.parent, &link.name, link.source)?;
                Some(ResponsePayload::Link)
            }
            RequestPayload::Unlink(entry) => {
                let inode = self.find(entry.parent, &entry.name)?;
                if self.kind(inode)? != ObjectType::File {
                    return None;
                }
                self.remove_entry(entry)?;
                if !self.is_referenced(inode) {
                    self.nodes.remove(&inode);
                }
                Some(ResponsePayload::Unlink)
            }
            RequestPayload::Read { inode } => match self.nodes.get(inode)? {
                Node::File(bytes) => Data::new(bytes.clone()).ok().map(ResponsePayload::Read),
                Node::Directory(_) => None,
            },
            RequestPayload::Write(write) => match self.nodes.get_mut(&write.inode)? {
                Node::File(bytes) => {
                    *bytes = write.data.as_bytes().to_vec();
                    Some(ResponsePayload::Write)
                }
                Node::Directory(_) => None,
            },
            RequestPayload::List { inode } => {
                let objects = self
                    .entries(*inode)?
                    .iter()
                    .take(MAX_OBJECTS)
                    .filter_map(|(name, child)| {
                        let kind = self.kind(*child)?;
                        Some(Object::new(ObjectInfo::new(kind, *child), name.clone()))
                    })
                    .collect();
                Objects::new(objects).ok().map(ResponsePayload::List)
            }
            RequestPayload::Rmdir(entry) => {
                let inode = self.find(entry.parent, &entry.name)?;
                if !self.entries(inode)?.is_empty() {
                    return None;
                }
                self.remove_entry(entry)?;
                self.nodes.remove(&inode);
                Some(ResponsePayload::Rmdir)
            }
            RequestPayload::Lookup(entry) => {
                let inode = self.find(entry.parent, &entry.name)?;
                let kind = self.kind(inode)?;
                Some(ResponsePayload::Lookup(ObjectInfo::new(kind, inode)))
            }
            RequestPayload::Mount => Some(ResponsePayload::Mount { inode: ROOT_INODE }),
        }
    }
}

pub type SharedStore = Arc<Mutex<ObjectStore>>;

fn lock(store: &SharedStore) -> MutexGuard<'_, ObjectStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serve one request from `stream` against `store`.
pub fn serve_connection(mut stream: TcpStream, wire: WireFormat, store: &SharedStore) {
    let request = match read_frame(&mut stream, wire.request_framing()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "test server failed to read request");
            return;
        }
    };
    let request = match wire.decode_request(&request) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "test server got undecodable request");
            return;
        }
    };
    let response = lock(store).handle(&request);
    if let Err(err) = stream.write_all(&wire.encode_response(&response)) {
        debug!(error = %err, "test server failed to reply");
    }
}

/// TCP server on 127.0.0.1 with one thread per connection.
///
/// Dropping the server stops accepting; connections already accepted run
/// to completion.
pub struct TestServer {
    endpoint: Endpoint,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Run `handler` for every accepted connection.
    pub fn spawn<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(TcpStream) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        let endpoint = Endpoint::new(Ipv4Addr::LOCALHOST, listener.local_addr()?.port());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handler = Arc::new(handler);

        let stop = shutdown.clone();
        let accept_thread = thread::spawn(move || {
            for stream in listener.incoming() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let handler = handler.clone();
                thread::spawn(move || handler(stream));
            }
        });

        Ok(Self {
            endpoint,
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    /// Speak the protocol in `wire` against a fresh store.
    pub fn serve(wire: WireFormat) -> io::Result<(Self, SharedStore)> {
        let store: SharedStore = Arc::new(Mutex::new(ObjectStore::new()));
        let shared = store.clone();
        let server = Self::spawn(move |stream| serve_connection(stream, wire, &shared))?;
        Ok((server, store))
    }

    /// Consume each request, then send `reply` in `chunk`-byte writes and close.
    ///
    /// `reply` may be shorter than a full message to simulate an early close.
    pub fn scripted(request_framing: Framing, reply: Vec<u8>, chunk: usize) -> io::Result<Self> {
        let chunk = chunk.max(1);
        Self::spawn(move |mut stream| {
            if read_frame(&mut stream, request_framing).is_err() {
                return;
            }
            let _ = stream.set_nodelay(true);
            for piece in reply.chunks(chunk) {
                if stream.write_all(piece).and_then(|_| stream.flush()).is_err() {
                    return;
                }
            }
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop so it observes the flag.
        let _ = TcpStream::connect(self.endpoint.addr());
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Transport that hands encoded requests straight to an [`ObjectStore`].
pub struct LoopbackTransport {
    store: SharedStore,
    wire: WireFormat,
}

impl LoopbackTransport {
    pub fn new(wire: WireFormat) -> Self {
        Self::with_store(wire, Arc::new(Mutex::new(ObjectStore::new())))
    }

    pub fn with_store(wire: WireFormat, store: SharedStore) -> Self {
        Self { store, wire }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

impl Transport for LoopbackTransport {
    fn call(&self, request: &[u8], _framing: Framing) -> Result<Vec<u8>, TransportError> {
        let request = self
            .wire
            .decode_request(request)
            .map_err(|err| TransportError::Send {
                source: io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
            })?;
        let response = lock(&self.store).handle(&request);
        Ok(self.wire.encode_response(&response))
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::new(Ipv4Addr::LOCALHOST, 0)
    }
}

/// Client wired to a private in-memory store.
pub fn memory_client(wire: WireFormat) -> RemoteFsClient<LoopbackTransport> {
    RemoteFsClient::new(LoopbackTransport::new(wire), wire)
}
