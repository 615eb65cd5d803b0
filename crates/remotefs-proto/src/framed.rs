// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Length-prefixed SSZ envelope
//!
//! Each message is a little-endian `u32` byte count followed by an SSZ
//! encoded frame. Unlike the native layout, messages only carry the bytes
//! their variant needs.

use crate::messages::{
    make_request, CreateRequest, EntryRequest, LinkRequest, MethodRequest, MethodResponse,
    MethodStatus, MethodType, RequestPayload, ResponsePayload, WriteRequest,
};
use crate::types::{Data, Name, Object, ObjectInfo, ObjectType, Objects};
use crate::validation::DecodeError;
use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};

/// Envelope version written by this crate.
pub const FRAME_VERSION: u8 = 1;

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 4;

/// Upper bound on the SSZ body following the prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct RequestFrame {
    pub version: u8,
    pub body: RequestBody,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum RequestBody {
    Create(CreateBody),
    Link(LinkBody),
    Unlink(NamedBody),
    Read(InodeBody),
    Write(WriteBody),
    List(InodeBody),
    Rmdir(NamedBody),
    Lookup(NamedBody),
    Mount(EmptyBody),
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct CreateBody {
    pub kind: u8,
    pub parent: u64,
    pub name: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct LinkBody {
    pub source: u64,
    pub parent: u64,
    pub name: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct NamedBody {
    pub parent: u64,
    pub name: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct InodeBody {
    pub inode: u64,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct WriteBody {
    pub inode: u64,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct EmptyBody {}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct ResponseFrame {
    pub version: u8,
    pub status: u8,
    pub method: u8,
    pub body: Option<ResponseBody>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum ResponseBody {
    Create(InodeBody),
    Link(EmptyBody),
    Unlink(EmptyBody),
    Read(DataBody),
    Write(EmptyBody),
    List(ListBody),
    Rmdir(EmptyBody),
    Lookup(InfoBody),
    Mount(InodeBody),
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct DataBody {
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct ListBody {
    pub entries: Vec<EntryBody>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct EntryBody {
    pub kind: u8,
    pub inode: u64,
    pub name: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct InfoBody {
    pub kind: u8,
    pub inode: u64,
}

fn prefixed(body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREFIX_LEN + body.len());
    // Bodies stay far below u32::MAX; MAX_FRAME_LEN is enforced on read.
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn unprefixed(buf: &[u8]) -> Result<&[u8], DecodeError> {
    if buf.len() < PREFIX_LEN {
        return Err(DecodeError::Truncated {
            expected: PREFIX_LEN,
            actual: buf.len(),
        });
    }
    let mut raw = [0u8; PREFIX_LEN];
    raw.copy_from_slice(&buf[..PREFIX_LEN]);
    let expected = PREFIX_LEN + u32::from_le_bytes(raw) as usize;
    if buf.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: buf.len(),
        });
    }
    if buf.len() > expected {
        return Err(DecodeError::TrailingBytes {
            expected,
            actual: buf.len(),
        });
    }
    Ok(&buf[PREFIX_LEN..])
}

fn ssz_error(err: ssz::DecodeError) -> DecodeError {
    DecodeError::Ssz(format!("{err:?}"))
}

fn object_type(tag: u8) -> Result<ObjectType, DecodeError> {
    ObjectType::from_tag(tag as u32).ok_or(DecodeError::UnknownObjectType(tag as u32))
}

fn request_body(payload: &RequestPayload) -> RequestBody {
    match payload {
        RequestPayload::Create(CreateRequest { kind, parent, name }) => {
            RequestBody::Create(CreateBody {
                kind: kind.tag() as u8,
                parent: *parent,
                name: name.as_bytes().to_vec(),
            })
        }
        RequestPayload::Link(LinkRequest {
            source,
            parent,
            name,
        }) => RequestBody::Link(LinkBody {
            source: *source,
            parent: *parent,
            name: name.as_bytes().to_vec(),
        }),
        RequestPayload::Unlink(entry) => RequestBody::Unlink(named(entry)),
        RequestPayload::Rmdir(entry) => RequestBody::Rmdir(named(entry)),
        RequestPayload::Lookup(entry) => RequestBody::Lookup(named(entry)),
        RequestPayload::Read { inode } => RequestBody::Read(InodeBody { inode: *inode }),
        RequestPayload::List { inode } => RequestBody::List(InodeBody { inode: *inode }),
        RequestPayload::Write(WriteRequest { inode, data }) => RequestBody::Write(WriteBody {
            inode: *inode,
            bytes: data.as_bytes().to_vec(),
        }),
        RequestPayload::Mount => RequestBody::Mount(EmptyBody {}),
    }
}

fn named(entry: &EntryRequest) -> NamedBody {
    NamedBody {
        parent: entry.parent,
        name: entry.name.as_bytes().to_vec(),
    }
}

fn entry(body: NamedBody) -> Result<EntryRequest, DecodeError> {
    Ok(EntryRequest {
        parent: body.parent,
        name: Name::new(body.name)?,
    })
}

fn request_payload(body: RequestBody) -> Result<RequestPayload, DecodeError> {
    Ok(match body {
        RequestBody::Create(body) => RequestPayload::Create(CreateRequest {
            kind: object_type(body.kind)?,
            parent: body.parent,
            name: Name::new(body.name)?,
        }),
        RequestBody::Link(body) => RequestPayload::Link(LinkRequest {
            source: body.source,
            parent: body.parent,
            name: Name::new(body.name)?,
        }),
        RequestBody::Unlink(body) => RequestPayload::Unlink(entry(body)?),
        RequestBody::Rmdir(body) => RequestPayload::Rmdir(entry(body)?),
        RequestBody::Lookup(body) => RequestPayload::Lookup(entry(body)?),
        RequestBody::Read(body) => RequestPayload::Read { inode: body.inode },
        RequestBody::List(body) => RequestPayload::List { inode: body.inode },
        RequestBody::Write(body) => RequestPayload::Write(WriteRequest {
            inode: body.inode,
            data: Data::new(body.bytes)?,
        }),
        RequestBody::Mount(_) => RequestPayload::Mount,
    })
}

fn response_body(payload: &ResponsePayload) -> ResponseBody {
    match payload {
        ResponsePayload::Create { inode } => ResponseBody::Create(InodeBody { inode: *inode }),
        ResponsePayload::Mount { inode } => ResponseBody::Mount(InodeBody { inode: *inode }),
        ResponsePayload::Link => ResponseBody::Link(EmptyBody {}),
        ResponsePayload::Unlink => ResponseBody::Unlink(EmptyBody {}),
        ResponsePayload::Write => ResponseBody::Write(EmptyBody {}),
        ResponsePayload::Rmdir => ResponseBody::Rmdir(EmptyBody {}),
        ResponsePayload::Read(data) => ResponseBody::Read(DataBody {
            bytes: data.as_bytes().to_vec(),
        }),
        ResponsePayload::List(objects) => ResponseBody::List(ListBody {
            entries: objects
                .iter()
                .map(|object| EntryBody {
                    kind: object.info.kind.tag() as u8,
                    inode: object.info.inode,
                    name: object.name.as_bytes().to_vec(),
                })
                .collect(),
        }),
        ResponsePayload::Lookup(info) => ResponseBody::Lookup(InfoBody {
            kind: info.kind.tag() as u8,
            inode: info.inode,
        }),
    }
}

fn response_payload(body: ResponseBody) -> Result<ResponsePayload, DecodeError> {
    Ok(match body {
        ResponseBody::Create(body) => ResponsePayload::Create { inode: body.inode },
        ResponseBody::Mount(body) => ResponsePayload::Mount { inode: body.inode },
        ResponseBody::Link(_) => ResponsePayload::Link,
        ResponseBody::Unlink(_) => ResponsePayload::Unlink,
        ResponseBody::Write(_) => ResponsePayload::Write,
        ResponseBody::Rmdir(_) => ResponsePayload::Rmdir,
        ResponseBody::Read(body) => ResponsePayload::Read(Data::new(body.bytes)?),
        ResponseBody::List(body) => {
            let objects = body
                .entries
                .into_iter()
                .map(|entry| {
                    let info = ObjectInfo::new(object_type(entry.kind)?, entry.inode);
                    Ok(Object::new(info, Name::new(entry.name)?))
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            ResponsePayload::List(Objects::new(objects)?)
        }
        ResponseBody::Lookup(body) => {
            ResponsePayload::Lookup(ObjectInfo::new(object_type(body.kind)?, body.inode))
        }
    })
}

pub fn encode_request(request: &MethodRequest) -> Vec<u8> {
    let frame = RequestFrame {
        version: FRAME_VERSION,
        body: request_body(request.payload()),
    };
    prefixed(frame.as_ssz_bytes())
}

pub fn decode_request(buf: &[u8]) -> Result<MethodRequest, DecodeError> {
    let frame = RequestFrame::from_ssz_bytes(unprefixed(buf)?).map_err(ssz_error)?;
    if frame.version != FRAME_VERSION {
        return Err(DecodeError::UnsupportedVersion(frame.version));
    }
    let payload = request_payload(frame.body)?;
    Ok(make_request(payload.method(), payload)?)
}

pub fn encode_response(response: &MethodResponse) -> Vec<u8> {
    let frame = ResponseFrame {
        version: FRAME_VERSION,
        status: response.status().tag() as u8,
        method: response.method().tag() as u8,
        body: response.payload().map(response_body),
    };
    prefixed(frame.as_ssz_bytes())
}

pub fn decode_response(buf: &[u8]) -> Result<MethodResponse, DecodeError> {
    let frame = ResponseFrame::from_ssz_bytes(unprefixed(buf)?).map_err(ssz_error)?;
    if frame.version != FRAME_VERSION {
        return Err(DecodeError::UnsupportedVersion(frame.version));
    }
    let status = MethodStatus::from_tag(frame.status as u32)
        .ok_or(DecodeError::UnknownStatus(frame.status as u32))?;
    let method = MethodType::from_tag(frame.method as u32)
        .ok_or(DecodeError::UnknownMethod(frame.method as u32))?;
    let payload = match (status, frame.body) {
        (MethodStatus::Ok, Some(body)) => Some(response_payload(body)?),
        _ => None,
    };
    MethodResponse::from_parts(status, method, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROOT_INODE;
    use crate::validation::ValidationError;

    #[test]
    fn prefix_matches_body_length() {
        let buf = encode_request(&MethodRequest::lookup(ROOT_INODE, "a").unwrap());
        let declared = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(declared, buf.len() - PREFIX_LEN);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let buf = encode_response(&MethodResponse::ok(ResponsePayload::Mount {
            inode: ROOT_INODE,
        }));
        assert!(matches!(
            decode_response(&buf[..buf.len() - 1]),
            Err(DecodeError::Truncated { .. })
        ));
        assert!(matches!(
            decode_response(&buf[..2]),
            Err(DecodeError::Truncated { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let frame = ResponseFrame {
            version: 9,
            status: 1,
            method: MethodType::Mount.tag() as u8,
            body: Some(ResponseBody::Mount(InodeBody { inode: ROOT_INODE })),
        };
        assert_eq!(
            decode_response(&prefixed(frame.as_ssz_bytes())),
            Err(DecodeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn body_disagreeing_with_tag_is_rejected() {
        let frame = ResponseFrame {
            version: FRAME_VERSION,
            status: MethodStatus::Ok.tag() as u8,
            method: MethodType::Lookup.tag() as u8,
            body: Some(ResponseBody::Create(InodeBody { inode: 5 })),
        };
        assert_eq!(
            decode_response(&prefixed(frame.as_ssz_bytes())),
            Err(DecodeError::BodyMismatch {
                expected: MethodType::Lookup,
                actual: MethodType::Create,
            })
        );
    }

    #[test]
    fn ok_frame_without_body_is_rejected() {
        let frame = ResponseFrame {
            version: FRAME_VERSION,
            status: MethodStatus::Ok.tag() as u8,
            method: MethodType::Mount.tag() as u8,
            body: None,
        };
        assert_eq!(
            decode_response(&prefixed(frame.as_ssz_bytes())),
            Err(DecodeError::MissingBody(MethodType::Mount))
        );
    }

    #[test]
    fn listing_above_limit_is_rejected() {
        let entry = |i: u64| EntryBody {
            kind: ObjectType::File.tag() as u8,
            inode: 2000 + i,
            name: format!("f{i}").into_bytes(),
        };
        let frame = |count: u64| ResponseFrame {
            version: FRAME_VERSION,
            status: MethodStatus::Ok.tag() as u8,
            method: MethodType::List.tag() as u8,
            body: Some(ResponseBody::List(ListBody {
                entries: (0..count).map(entry).collect(),
            })),
        };
        let full = decode_response(&prefixed(frame(32).as_ssz_bytes())).unwrap();
        assert!(matches!(
            full.payload(),
            Some(ResponsePayload::List(objects)) if objects.len() == 32
        ));
        assert_eq!(
            decode_response(&prefixed(frame(33).as_ssz_bytes())),
            Err(DecodeError::Invalid(ValidationError::ListingTooLarge {
                count: 33,
                max: 32,
            }))
        );
    }

    #[test]
    fn unknown_entry_type_is_rejected() {
        let frame = ResponseFrame {
            version: FRAME_VERSION,
            status: MethodStatus::Ok.tag() as u8,
            method: MethodType::Lookup.tag() as u8,
            body: Some(ResponseBody::Lookup(InfoBody { kind: 3, inode: 42 })),
        };
        assert_eq!(
            decode_response(&prefixed(frame.as_ssz_bytes())),
            Err(DecodeError::UnknownObjectType(3))
        );
    }

    #[test]
    fn oversized_payload_in_frame_is_rejected() {
        let frame = ResponseFrame {
            version: FRAME_VERSION,
            status: MethodStatus::Ok.tag() as u8,
            method: MethodType::Read.tag() as u8,
            body: Some(ResponseBody::Read(DataBody {
                bytes: vec![1u8; 2048],
            })),
        };
        assert!(matches!(
            decode_response(&prefixed(frame.as_ssz_bytes())),
            Err(DecodeError::Invalid(_))
        ));
    }
}
