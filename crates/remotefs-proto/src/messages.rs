// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request/response message types for the RemoteFS object server

use crate::types::{Data, Inode, Name, ObjectInfo, ObjectType, Objects};
use crate::validation::{check_body, check_payload, DecodeError, ValidationError};
use std::fmt;

/// Operation carried by a request and echoed by its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MethodType {
    Create = 1,
    Link = 2,
    Unlink = 3,
    Read = 4,
    Write = 5,
    List = 6,
    Rmdir = 7,
    Lookup = 8,
    Mount = 9,
}

impl MethodType {
    pub const ALL: [MethodType; 9] = [
        MethodType::Create,
        MethodType::Link,
        MethodType::Unlink,
        MethodType::Read,
        MethodType::Write,
        MethodType::List,
        MethodType::Rmdir,
        MethodType::Lookup,
        MethodType::Mount,
    ];

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|method| method.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MethodType::Create => "create",
            MethodType::Link => "link",
            MethodType::Unlink => "unlink",
            MethodType::Read => "read",
            MethodType::Write => "write",
            MethodType::List => "list",
            MethodType::Rmdir => "rmdir",
            MethodType::Lookup => "lookup",
            MethodType::Mount => "mount",
        }
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MethodStatus {
    Ok = 1,
    Err = 2,
}

impl MethodStatus {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(MethodStatus::Ok),
            2 => Some(MethodStatus::Err),
            _ => None,
        }
    }
}

/// Create a file or directory under `parent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRequest {
    pub kind: ObjectType,
    pub parent: Inode,
    pub name: Name,
}

/// Add `name` under `parent` as another name for `source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRequest {
    pub source: Inode,
    pub parent: Inode,
    pub name: Name,
}

/// Payload shared by unlink, rmdir and lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryRequest {
    pub parent: Inode,
    pub name: Name,
}

/// Replace the whole content of `inode`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    pub inode: Inode,
    pub data: Data,
}

/// Exactly one payload variant per [`MethodType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestPayload {
    Create(CreateRequest),
    Link(LinkRequest),
    Unlink(EntryRequest),
    Read { inode: Inode },
    Write(WriteRequest),
    List { inode: Inode },
    Rmdir(EntryRequest),
    Lookup(EntryRequest),
    Mount,
}

impl RequestPayload {
    pub fn method(&self) -> MethodType {
        match self {
            RequestPayload::Create(_) => MethodType::Create,
            RequestPayload::Link(_) => MethodType::Link,
            RequestPayload::Unlink(_) => MethodType::Unlink,
            RequestPayload::Read { .. } => MethodType::Read,
            RequestPayload::Write(_) => MethodType::Write,
            RequestPayload::List { .. } => MethodType::List,
            RequestPayload::Rmdir(_) => MethodType::Rmdir,
            RequestPayload::Lookup(_) => MethodType::Lookup,
            RequestPayload::Mount => MethodType::Mount,
        }
    }
}

/// A request whose tag is known to agree with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodRequest {
    method: MethodType,
    payload: RequestPayload,
}

/// Pair a tag with a payload, refusing mismatched pairs.
///
/// Names and data inside the payload are already bounded by [`Name`] and
/// [`Data`], so an oversized name surfaces as `NameTooLong` when the payload
/// is assembled through the typed constructors on [`MethodRequest`].
pub fn make_request(
    method: MethodType,
    payload: RequestPayload,
) -> Result<MethodRequest, ValidationError> {
    check_payload(method, payload.method())?;
    Ok(MethodRequest { method, payload })
}

// Typed constructors; each one is a make_request call with a matching tag.
impl MethodRequest {
    pub fn create(
        parent: Inode,
        name: impl AsRef<[u8]>,
        kind: ObjectType,
    ) -> Result<Self, ValidationError> {
        let name = Name::new(name.as_ref())?;
        make_request(
            MethodType::Create,
            RequestPayload::Create(CreateRequest { kind, parent, name }),
        )
    }

    pub fn link(
        source: Inode,
        parent: Inode,
        name: impl AsRef<[u8]>,
    ) -> Result<Self, ValidationError> {
        let name = Name::new(name.as_ref())?;
        make_request(
            MethodType::Link,
            RequestPayload::Link(LinkRequest {
                source,
                parent,
                name,
            }),
        )
    }

    pub fn unlink(parent: Inode, name: impl AsRef<[u8]>) -> Result<Self, ValidationError> {
        let name = Name::new(name.as_ref())?;
        make_request(
            MethodType::Unlink,
            RequestPayload::Unlink(EntryRequest { parent, name }),
        )
    }

    pub fn rmdir(parent: Inode, name: impl AsRef<[u8]>) -> Result<Self, ValidationError> {
        let name = Name::new(name.as_ref())?;
        make_request(
            MethodType::Rmdir,
            RequestPayload::Rmdir(EntryRequest { parent, name }),
        )
    }

    pub fn lookup(parent: Inode, name: impl AsRef<[u8]>) -> Result<Self, ValidationError> {
        let name = Name::new(name.as_ref())?;
        make_request(
            MethodType::Lookup,
            RequestPayload::Lookup(EntryRequest { parent, name }),
        )
    }

    pub fn read(inode: Inode) -> Self {
        Self {
            method: MethodType::Read,
            payload: RequestPayload::Read { inode },
        }
    }

    pub fn write(inode: Inode, bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let data = Data::new(bytes)?;
        make_request(
            MethodType::Write,
            RequestPayload::Write(WriteRequest { inode, data }),
        )
    }

    pub fn list(inode: Inode) -> Self {
        Self {
            method: MethodType::List,
            payload: RequestPayload::List { inode },
        }
    }

    pub fn mount() -> Self {
        Self {
            method: MethodType::Mount,
            payload: RequestPayload::Mount,
        }
    }

    pub fn method(&self) -> MethodType {
        self.method
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub fn into_payload(self) -> RequestPayload {
        self.payload
    }
}

/// Successful response bodies, one per [`MethodType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponsePayload {
    Create { inode: Inode },
    Link,
    Unlink,
    Read(Data),
    Write,
    List(Objects),
    Rmdir,
    Lookup(ObjectInfo),
    Mount { inode: Inode },
}

impl ResponsePayload {
    pub fn method(&self) -> MethodType {
        match self {
            ResponsePayload::Create { .. } => MethodType::Create,
            ResponsePayload::Link => MethodType::Link,
            ResponsePayload::Unlink => MethodType::Unlink,
            ResponsePayload::Read(_) => MethodType::Read,
            ResponsePayload::Write => MethodType::Write,
            ResponsePayload::List(_) => MethodType::List,
            ResponsePayload::Rmdir => MethodType::Rmdir,
            ResponsePayload::Lookup(_) => MethodType::Lookup,
            ResponsePayload::Mount { .. } => MethodType::Mount,
        }
    }

    /// Body for methods whose success carries no data.
    pub fn empty(method: MethodType) -> Option<Self> {
        match method {
            MethodType::Link => Some(ResponsePayload::Link),
            MethodType::Unlink => Some(ResponsePayload::Unlink),
            MethodType::Write => Some(ResponsePayload::Write),
            MethodType::Rmdir => Some(ResponsePayload::Rmdir),
            _ => None,
        }
    }
}

/// A response as received; its tag may still disagree with the request sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodResponse {
    status: MethodStatus,
    method: MethodType,
    payload: Option<ResponsePayload>,
}

impl MethodResponse {
    pub fn ok(payload: ResponsePayload) -> Self {
        Self {
            status: MethodStatus::Ok,
            method: payload.method(),
            payload: Some(payload),
        }
    }

    pub fn err(method: MethodType) -> Self {
        Self {
            status: MethodStatus::Err,
            method,
            payload: None,
        }
    }

    /// Reassemble a decoded response, enforcing that Ok carries a matching body.
    pub fn from_parts(
        status: MethodStatus,
        method: MethodType,
        payload: Option<ResponsePayload>,
    ) -> Result<Self, DecodeError> {
        match (status, payload) {
            (MethodStatus::Ok, Some(payload)) => {
                check_body(method, &payload)?;
                Ok(Self::ok(payload))
            }
            (MethodStatus::Ok, None) => Err(DecodeError::MissingBody(method)),
            (MethodStatus::Err, _) => Ok(Self::err(method)),
        }
    }

    pub fn status(&self) -> MethodStatus {
        self.status
    }

    pub fn method(&self) -> MethodType {
        self.method
    }

    pub fn is_ok(&self) -> bool {
        self.status == MethodStatus::Ok
    }

    pub fn payload(&self) -> Option<&ResponsePayload> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<ResponsePayload> {
        self.payload
    }
}
