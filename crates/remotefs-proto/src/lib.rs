// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RemoteFS Protocol: message types, validation and wire codecs
//!
//! This crate defines the request/response model spoken with the remote
//! object server and its two encodings: the fixed-size native layout and
//! the length-prefixed SSZ envelope.

pub mod framed;
pub mod messages;
pub mod native;
pub mod types;
pub mod validation;
pub mod wire;

// Re-export key types
pub use messages::{
    make_request, CreateRequest, EntryRequest, LinkRequest, MethodRequest, MethodResponse,
    MethodStatus, MethodType, RequestPayload, ResponsePayload, WriteRequest,
};
pub use types::{
    make_data, Data, Inode, Name, Object, ObjectInfo, ObjectType, Objects, MAX_DATA_LEN,
    MAX_NAME_LEN, MAX_OBJECTS, NAME_BUFFER_LEN, ROOT_INODE,
};
pub use validation::*;
pub use wire::{Framing, WireFormat};
