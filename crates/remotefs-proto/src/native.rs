// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-size native layout, bit-compatible with the C object server on
//! little-endian LP64 hosts.
//!
//! Request (1048 bytes): `type: u32` at 0, union at 8.
//! Response (8720 bytes): `status: u32` at 0, `type: u32` at 4, union at 8.
//! Every message occupies its full size on the wire regardless of variant;
//! unused bytes are zero.

use crate::messages::{
    make_request, CreateRequest, EntryRequest, LinkRequest, MethodRequest, MethodResponse, MethodStatus,
    MethodType, RequestPayload, ResponsePayload, WriteRequest,
};
use crate::types::{
    Data, Name, Object, ObjectInfo, ObjectType, Objects, MAX_DATA_LEN, MAX_OBJECTS,
    NAME_BUFFER_LEN,
};
use crate::validation::DecodeError;

pub const REQUEST_SIZE: usize = 1048;
pub const RESPONSE_SIZE: usize = 8720;

const UNION_OFFSET: usize = 8;
const OBJECT_ENTRY_SIZE: usize = 272;
const LIST_OBJECTS_OFFSET: usize = UNION_OFFSET + 8;

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_i32(buf: &mut [u8], at: usize, value: i32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_name(buf: &mut [u8], at: usize, name: &Name) {
    // Buffer is pre-zeroed, so the terminator is already in place.
    buf[at..at + name.len()].copy_from_slice(name.as_bytes());
}

fn get_u16(buf: &[u8], at: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[at..at + 2]);
    u16::from_le_bytes(raw)
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn get_i32(buf: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    i32::from_le_bytes(raw)
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn get_name(buf: &[u8], at: usize) -> Result<Name, DecodeError> {
    let field = &buf[at..at + NAME_BUFFER_LEN];
    let end = field
        .iter()
        .position(|b| *b == 0)
        .ok_or(DecodeError::UnterminatedName)?;
    Ok(Name::new(&field[..end])?)
}

fn get_object_type(buf: &[u8], at: usize) -> Result<ObjectType, DecodeError> {
    let tag = get_u32(buf, at);
    ObjectType::from_tag(tag).ok_or(DecodeError::UnknownObjectType(tag))
}

fn get_data(buf: &[u8], length_at: usize) -> Result<Data, DecodeError> {
    let length = get_i32(buf, length_at);
    if length < 0 || length as usize > MAX_DATA_LEN {
        return Err(DecodeError::InvalidLength(length as i64));
    }
    let start = length_at + 4;
    Ok(Data::new(&buf[start..start + length as usize])?)
}

fn check_size(buf: &[u8], expected: usize) -> Result<(), DecodeError> {
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
    Ok(())
}

pub fn encode_request(request: &MethodRequest) -> Vec<u8> {
    let mut buf = vec![0u8; REQUEST_SIZE];
    put_u32(&mut buf, 0, request.method().tag());
    let u = UNION_OFFSET;
    match request.payload() {
        RequestPayload::Create(CreateRequest { kind, parent, name }) => {
            put_u32(&mut buf, u, kind.tag());
            put_u64(&mut buf, u + 8, *parent);
            put_name(&mut buf, u + 16, name);
        }
        RequestPayload::Link(LinkRequest {
            source,
            parent,
            name,
        }) => {
            put_u64(&mut buf, u, *source);
            put_u64(&mut buf, u + 8, *parent);
            put_name(&mut buf, u + 16, name);
        }
        RequestPayload::Unlink(EntryRequest { parent, name })
        | RequestPayload::Rmdir(EntryRequest { parent, name })
        | RequestPayload::Lookup(EntryRequest { parent, name }) => {
            put_u64(&mut buf, u, *parent);
            put_name(&mut buf, u + 8, name);
        }
        RequestPayload::Read { inode } | RequestPayload::List { inode } => {
            put_u64(&mut buf, u, *inode);
        }
        RequestPayload::Write(WriteRequest { inode, data }) => {
            put_u64(&mut buf, u, *inode);
            put_i32(&mut buf, u + 8, data.length());
            buf[u + 12..u + 12 + data.len()].copy_from_slice(data.as_bytes());
        }
        RequestPayload::Mount => {}
    }
    buf
}

pub fn decode_request(buf: &[u8]) -> Result<MethodRequest, DecodeError> {
    check_size(buf, REQUEST_SIZE)?;
    let tag = get_u32(buf, 0);
    let method = MethodType::from_tag(tag).ok_or(DecodeError::UnknownMethod(tag))?;
    let u = UNION_OFFSET;
    let entry = || -> Result<EntryRequest, DecodeError> {
        Ok(EntryRequest {
            parent: get_u64(buf, u),
            name: get_name(buf, u + 8)?,
        })
    };
    let payload = match method {
        MethodType::Create => RequestPayload::Create(CreateRequest {
            kind: get_object_type(buf, u)?,
            parent: get_u64(buf, u + 8),
            name: get_name(buf, u + 16)?,
        }),
        MethodType::Link => RequestPayload::Link(LinkRequest {
            source: get_u64(buf, u),
            parent: get_u64(buf, u + 8),
            name: get_name(buf, u + 16)?,
        }),
        MethodType::Unlink => RequestPayload::Unlink(entry()?),
        MethodType::Rmdir => RequestPayload::Rmdir(entry()?),
        MethodType::Lookup => RequestPayload::Lookup(entry()?),
        MethodType::Read => RequestPayload::Read {
            inode: get_u64(buf, u),
        },
        MethodType::List => RequestPayload::List {
            inode: get_u64(buf, u),
        },
        MethodType::Write => RequestPayload::Write(WriteRequest {
            inode: get_u64(buf, u),
            data: get_data(buf, u + 8)?,
        }),
        MethodType::Mount => RequestPayload::Mount,
    };
    Ok(make_request(method, payload)?)
}

pub fn encode_response(response: &MethodResponse) -> Vec<u8> {
    let mut buf = vec![0u8; RESPONSE_SIZE];
    put_u32(&mut buf, 0, response.status().tag());
    put_u32(&mut buf, 4, response.method().tag());
    let u = UNION_OFFSET;
    match response.payload() {
        Some(ResponsePayload::Create { inode }) | Some(ResponsePayload::Mount { inode }) => {
            put_u64(&mut buf, u, *inode);
        }
        Some(ResponsePayload::Read(data)) => {
            put_i32(&mut buf, u, data.length());
            buf[u + 4..u + 4 + data.len()].copy_from_slice(data.as_bytes());
        }
        Some(ResponsePayload::List(objects)) => {
            // Bounded by MAX_OBJECTS.
            put_u16(&mut buf, u, objects.len() as u16);
            for (i, object) in objects.iter().enumerate() {
                let at = LIST_OBJECTS_OFFSET + i * OBJECT_ENTRY_SIZE;
                put_u32(&mut buf, at, object.info.kind.tag());
                put_u64(&mut buf, at + 8, object.info.inode);
                put_name(&mut buf, at + 16, &object.name);
            }
        }
        Some(ResponsePayload::Lookup(info)) => {
            put_u32(&mut buf, u, info.kind.tag());
            put_u64(&mut buf, u + 8, info.inode);
        }
        Some(ResponsePayload::Link)
        | Some(ResponsePayload::Unlink)
        | Some(ResponsePayload::Write)
        | Some(ResponsePayload::Rmdir)
        | None => {}
    }
    buf
}

pub fn decode_response(buf: &[u8]) -> Result<MethodResponse, DecodeError> {
    check_size(buf, RESPONSE_SIZE)?;
    let status_tag = get_u32(buf, 0);
    let status =
        MethodStatus::from_tag(status_tag).ok_or(DecodeError::UnknownStatus(status_tag))?;
    let method_tag = get_u32(buf, 4);
    let method = MethodType::from_tag(method_tag).ok_or(DecodeError::UnknownMethod(method_tag))?;
    if status == MethodStatus::Err {
        return Ok(MethodResponse::err(method));
    }

    let u = UNION_OFFSET;
    let payload = match method {
        MethodType::Create => ResponsePayload::Create {
            inode: get_u64(buf, u),
        },
        MethodType::Mount => ResponsePayload::Mount {
            inode: get_u64(buf, u),
        },
        MethodType::Read => ResponsePayload::Read(get_data(buf, u)?),
        MethodType::List => {
            let count = get_u16(buf, u);
            if count as usize > MAX_OBJECTS {
                return Err(DecodeError::InvalidCount(count));
            }
            let mut objects = Vec::with_capacity(count as usize);
            for i in 0..count as usize {
                let at = LIST_OBJECTS_OFFSET + i * OBJECT_ENTRY_SIZE;
                let info = ObjectInfo::new(get_object_type(buf, at)?, get_u64(buf, at + 8));
                objects.push(Object::new(info, get_name(buf, at + 16)?));
            }
            ResponsePayload::List(Objects::new(objects)?)
        }
        MethodType::Lookup => ResponsePayload::Lookup(ObjectInfo::new(
            get_object_type(buf, u)?,
            get_u64(buf, u + 8),
        )),
        MethodType::Link => ResponsePayload::Link,
        MethodType::Unlink => ResponsePayload::Unlink,
        MethodType::Write => ResponsePayload::Write,
        MethodType::Rmdir => ResponsePayload::Rmdir,
    };
    MethodResponse::from_parts(status, method, Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROOT_INODE;

    #[test]
    fn layout_sizes() {
        assert_eq!(encode_request(&MethodRequest::mount()).len(), REQUEST_SIZE);
        assert_eq!(
            encode_response(&MethodResponse::err(MethodType::List)).len(),
            RESPONSE_SIZE
        );
        assert_eq!(
            LIST_OBJECTS_OFFSET + MAX_OBJECTS * OBJECT_ENTRY_SIZE,
            RESPONSE_SIZE
        );
    }

    #[test]
    fn create_request_field_offsets() {
        let request = MethodRequest::create(ROOT_INODE, "notes", ObjectType::Directory).unwrap();
        let buf = encode_request(&request);
        assert_eq!(get_u32(&buf, 0), 1);
        assert_eq!(get_u32(&buf, 8), 2);
        assert_eq!(get_u64(&buf, 16), ROOT_INODE);
        assert_eq!(&buf[24..29], b"notes");
        assert_eq!(buf[29], 0);
    }

    #[test]
    fn write_request_field_offsets() {
        let buf = encode_request(&MethodRequest::write(42, &b"hello"[..]).unwrap());
        assert_eq!(get_u32(&buf, 0), 5);
        assert_eq!(get_u64(&buf, 8), 42);
        assert_eq!(get_i32(&buf, 16), 5);
        assert_eq!(&buf[20..25], b"hello");
    }

    #[test]
    fn list_response_field_offsets() {
        let objects = Objects::new(vec![
            Object::new(
                ObjectInfo::new(ObjectType::File, 7),
                Name::new("a").unwrap(),
            ),
            Object::new(
                ObjectInfo::new(ObjectType::Directory, 8),
                Name::new("b").unwrap(),
            ),
        ])
        .unwrap();
        let buf = encode_response(&MethodResponse::ok(ResponsePayload::List(objects)));
        assert_eq!(get_u32(&buf, 0), 1);
        assert_eq!(get_u32(&buf, 4), 6);
        assert_eq!(get_u16(&buf, 8), 2);
        assert_eq!(get_u32(&buf, 16), 1);
        assert_eq!(get_u64(&buf, 24), 7);
        assert_eq!(buf[32], b'a');
        assert_eq!(get_u32(&buf, 16 + 272), 2);
        assert_eq!(get_u64(&buf, 24 + 272), 8);
    }

    #[test]
    fn short_and_long_buffers_are_rejected() {
        let buf = encode_response(&MethodResponse::ok(ResponsePayload::Mount {
            inode: ROOT_INODE,
        }));
        assert_eq!(
            decode_response(&buf[..100]),
            Err(DecodeError::Truncated {
                expected: RESPONSE_SIZE,
                actual: 100
            })
        );
        let mut long = buf.clone();
        long.push(0);
        assert!(matches!(
            decode_response(&long),
            Err(DecodeError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn corrupt_fields_are_rejected() {
        let mut buf = encode_response(&MethodResponse::ok(ResponsePayload::Read(
            Data::new(&b"abc"[..]).unwrap(),
        )));
        put_i32(&mut buf, 8, 4096);
        assert_eq!(decode_response(&buf), Err(DecodeError::InvalidLength(4096)));
        put_i32(&mut buf, 8, -1);
        assert_eq!(decode_response(&buf), Err(DecodeError::InvalidLength(-1)));

        let mut buf = encode_request(&MethodRequest::lookup(ROOT_INODE, "x").unwrap());
        for byte in &mut buf[16..16 + NAME_BUFFER_LEN] {
            *byte = b'x';
        }
        assert_eq!(decode_request(&buf), Err(DecodeError::UnterminatedName));

        let mut buf = encode_request(&MethodRequest::mount());
        put_u32(&mut buf, 0, 77);
        assert_eq!(decode_request(&buf), Err(DecodeError::UnknownMethod(77)));
    }

    #[test]
    fn listing_count_above_limit_is_rejected() {
        let mut buf = encode_response(&MethodResponse::ok(ResponsePayload::List(
            Objects::default(),
        )));
        put_u16(&mut buf, 8, 32);
        // 32 zeroed entries still fail on the zero type tag, not on the count.
        assert_eq!(decode_response(&buf), Err(DecodeError::UnknownObjectType(0)));
        put_u16(&mut buf, 8, 33);
        assert_eq!(decode_response(&buf), Err(DecodeError::InvalidCount(33)));
        put_u16(&mut buf, 8, u16::MAX);
        assert_eq!(
            decode_response(&buf),
            Err(DecodeError::InvalidCount(u16::MAX))
        );
    }

    #[test]
    fn unknown_object_type_is_rejected() {
        let mut buf = encode_response(&MethodResponse::ok(ResponsePayload::Lookup(
            ObjectInfo::new(ObjectType::File, 42),
        )));
        put_u32(&mut buf, 8, 3);
        assert_eq!(decode_response(&buf), Err(DecodeError::UnknownObjectType(3)));

        let request = MethodRequest::create(ROOT_INODE, "x", ObjectType::File).unwrap();
        let mut buf = encode_request(&request);
        put_u32(&mut buf, 8, 0);
        assert_eq!(decode_request(&buf), Err(DecodeError::UnknownObjectType(0)));
    }

    #[test]
    fn error_status_ignores_union_bytes() {
        let mut buf = encode_response(&MethodResponse::err(MethodType::Read));
        put_i32(&mut buf, 8, -5);
        let response = decode_response(&buf).unwrap();
        assert_eq!(response.status(), MethodStatus::Err);
        assert_eq!(response.method(), MethodType::Read);
    }
}
