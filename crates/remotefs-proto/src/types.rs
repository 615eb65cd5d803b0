// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-capacity value types shared by requests and responses

use crate::validation::ValidationError;
use std::fmt;

/// Server-assigned object identifier. Opaque to the client.
pub type Inode = u64;

/// Inode of the root directory, the only identifier the client knows a priori.
pub const ROOT_INODE: Inode = 1337;

/// Size of the on-wire name buffer, terminator included.
pub const NAME_BUFFER_LEN: usize = 256;

/// Longest name that fits the name buffer.
pub const MAX_NAME_LEN: usize = NAME_BUFFER_LEN - 1;

/// Maximum number of entries a single listing can carry.
pub const MAX_OBJECTS: usize = 32;

/// Maximum whole-file payload exchanged in one message.
pub const MAX_DATA_LEN: usize = 1024;

/// Kind of object stored by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ObjectType {
    File = 1,
    Directory = 2,
}

impl ObjectType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(ObjectType::File),
            2 => Some(ObjectType::Directory),
            _ => None,
        }
    }

    pub fn is_dir(self) -> bool {
        self == ObjectType::Directory
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::File => write!(f, "file"),
            ObjectType::Directory => write!(f, "dir"),
        }
    }
}

/// Identity of one object as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectInfo {
    pub kind: ObjectType,
    pub inode: Inode,
}

impl ObjectInfo {
    pub fn new(kind: ObjectType, inode: Inode) -> Self {
        Self { kind, inode }
    }

    /// Info for the well-known root directory.
    pub fn root() -> Self {
        Self::new(ObjectType::Directory, ROOT_INODE)
    }
}

/// A directory entry name that is guaranteed to fit the wire name buffer.
///
/// Names are raw bytes (the host layer may hand over non-UTF-8 names). They are
/// never empty and never contain NUL, which the native layout uses as the
/// terminator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong {
                len: bytes.len(),
                max: MAX_NAME_LEN,
            });
        }
        if bytes.is_empty() {
            return Err(ValidationError::InvalidName("empty name".to_string()));
        }
        if bytes.contains(&0) {
            return Err(ValidationError::InvalidName(
                "name contains a NUL byte".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering for display and logs.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl TryFrom<&str> for Name {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Name::new(value.as_bytes())
    }
}

impl TryFrom<&[u8]> for Name {
    type Error = ValidationError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Name::new(value)
    }
}

/// One directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    pub info: ObjectInfo,
    pub name: Name,
}

impl Object {
    pub fn new(info: ObjectInfo, name: Name) -> Self {
        Self { info, name }
    }
}

/// Directory listing capped at [`MAX_OBJECTS`] entries, in server order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Objects(Vec<Object>);

impl Objects {
    pub fn new(objects: Vec<Object>) -> Result<Self, ValidationError> {
        if objects.len() > MAX_OBJECTS {
            return Err(ValidationError::ListingTooLarge {
                count: objects.len(),
                max: MAX_OBJECTS,
            });
        }
        Ok(Self(objects))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Object] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Object> {
        self.0
    }
}

impl IntoIterator for Objects {
    type Item = Object;
    type IntoIter = std::vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Objects {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Whole-file payload capped at [`MAX_DATA_LEN`] bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Data(Vec<u8>);

impl Data {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_DATA_LEN {
            return Err(ValidationError::PayloadTooLarge {
                len: bytes.len(),
                max: MAX_DATA_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Payload length as carried in the wire `length` field.
    pub fn length(&self) -> i32 {
        // Bounded by MAX_DATA_LEN.
        self.0.len() as i32
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Bytes in `[offset, offset + len)`, clamped to the payload.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.0.len());
        let end = start.saturating_add(len).min(self.0.len());
        &self.0[start..end]
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data").field("length", &self.0.len()).finish()
    }
}

/// Build a payload, rejecting anything above [`MAX_DATA_LEN`].
pub fn make_data(bytes: impl Into<Vec<u8>>) -> Result<Data, ValidationError> {
    Data::new(bytes)
}
