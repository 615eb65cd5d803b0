// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host-side filesystem logic shared by the FUSE adapter
//!
//! Translates kernel inode numbers and byte ranges into whole-object calls
//! on a [`VfsOperations`] backend. Everything here is independent of
//! `fuser` so it can be exercised against the in-memory store.

use libc::{EFBIG, EINVAL, ENOENT, ENOTDIR};
use remotefs_client::{ClientError, VfsOperations};
use remotefs_proto::{Inode, ObjectInfo, ObjectType, MAX_DATA_LEN, ROOT_INODE};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Kernel-side root inode.
pub const FUSE_ROOT_INO: u64 = 1;

/// Kernel inode for a remote inode. 1 and 1337 trade places.
pub fn to_fuse_ino(remote: Inode) -> u64 {
    match remote {
        ROOT_INODE => FUSE_ROOT_INO,
        FUSE_ROOT_INO => ROOT_INODE,
        other => other,
    }
}

/// Remote inode for a kernel inode.
pub fn to_remote_ino(ino: u64) -> Inode {
    // The swap is its own inverse.
    to_fuse_ino(ino)
}

/// `existing` with `data` written at `offset`; any gap is zero-filled.
pub fn splice_payload(existing: &[u8], offset: usize, data: &[u8]) -> Vec<u8> {
    let end = offset + data.len();
    let mut content = existing.to_vec();
    if content.len() < end {
        content.resize(end, 0);
    }
    content[offset..end].copy_from_slice(data);
    content
}

/// `existing` truncated or zero-extended to `size` bytes.
pub fn resize_payload(existing: &[u8], size: usize) -> Vec<u8> {
    let mut content = existing.to_vec();
    content.resize(size, 0);
    content
}

/// Attributes the host can report for one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAttr {
    /// Kernel inode.
    pub ino: u64,
    pub kind: ObjectType,
    pub size: u64,
}

/// One `readdir` entry; `next_offset` is what the kernel passes back to resume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub next_offset: i64,
    pub kind: ObjectType,
    pub name: Vec<u8>,
}

/// Errno from a lookup failure. A remote error there means the name is absent.
fn lookup_errno(err: &ClientError) -> i32 {
    if err.is_remote() {
        ENOENT
    } else {
        err.errno()
    }
}

pub struct RemoteFsHost<V> {
    vfs: V,
    kinds: HashMap<Inode, ObjectType>,
}

impl<V: VfsOperations> RemoteFsHost<V> {
    pub fn new(vfs: V) -> Self {
        let mut kinds = HashMap::new();
        kinds.insert(ROOT_INODE, ObjectType::Directory);
        Self { vfs, kinds }
    }

    pub fn vfs(&self) -> &V {
        &self.vfs
    }

    /// Kind recorded for a kernel inode, if it has been seen.
    pub fn kind_of(&self, ino: u64) -> Option<ObjectType> {
        self.kinds.get(&to_remote_ino(ino)).copied()
    }

    fn remember(&mut self, info: ObjectInfo) {
        self.kinds.insert(info.inode, info.kind);
    }

    fn forget_remote(&mut self, inode: Inode) {
        if inode != ROOT_INODE {
            self.kinds.remove(&inode);
        }
    }

    fn attr_for(&self, info: ObjectInfo) -> Result<NodeAttr, i32> {
        let size = match info.kind {
            ObjectType::Directory => 0,
            ObjectType::File => self.vfs.read(info.inode).map_err(|e| e.errno())?.len() as u64,
        };
        Ok(NodeAttr {
            ino: to_fuse_ino(info.inode),
            kind: info.kind,
            size,
        })
    }

    pub fn lookup(&mut self, parent: u64, name: &[u8]) -> Result<NodeAttr, i32> {
        let info = self
            .vfs
            .lookup(to_remote_ino(parent), name)
            .map_err(|e| lookup_errno(&e))?;
        self.remember(info);
        self.attr_for(info)
    }

    pub fn getattr(&self, ino: u64) -> Result<NodeAttr, i32> {
        let inode = to_remote_ino(ino);
        match self.kinds.get(&inode) {
            Some(kind) => self.attr_for(ObjectInfo::new(*kind, inode)),
            None => {
                debug!(ino, "getattr on an inode never looked up");
                Err(ENOENT)
            }
        }
    }

    /// Listing entries of directory `ino` from `offset` onward.
    pub fn readdir(&mut self, ino: u64, offset: i64) -> Result<Vec<DirEntry>, i32> {
        if offset < 0 {
            return Err(EINVAL);
        }
        let objects = self
            .vfs
            .list(to_remote_ino(ino))
            .map_err(|e| e.errno())?;

        let mut entries = Vec::new();
        for (index, object) in objects.into_iter().enumerate().skip(offset as usize) {
            self.remember(object.info);
            entries.push(DirEntry {
                ino: to_fuse_ino(object.info.inode),
                next_offset: index as i64 + 1,
                kind: object.info.kind,
                name: object.name.into_bytes(),
            });
        }
        Ok(entries)
    }

    /// Bytes `[offset, offset + size)` of the file, clipped to its length.
    pub fn read(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, i32> {
        let offset = usize::try_from(offset).map_err(|_| EINVAL)?;
        let data = self.vfs.read(to_remote_ino(ino)).map_err(|e| e.errno())?;
        Ok(data.slice(offset, size as usize).to_vec())
    }

    /// Splice `data` into the current content at `offset` and store the result.
    pub fn write(&self, ino: u64, offset: i64, data: &[u8]) -> Result<u32, i32> {
        let offset = usize::try_from(offset).map_err(|_| EINVAL)?;
        if offset.saturating_add(data.len()) > MAX_DATA_LEN {
            return Err(EFBIG);
        }
        let inode = to_remote_ino(ino);
        let existing = self.vfs.read(inode).map_err(|e| e.errno())?;
        let content = splice_payload(existing.as_bytes(), offset, data);
        self.vfs.write(inode, &content).map_err(|e| e.errno())?;
        Ok(data.len() as u32)
    }

    /// Truncate or extend a file to `size` bytes.
    pub fn truncate(&self, ino: u64, size: u64) -> Result<NodeAttr, i32> {
        if self.kind_of(ino) == Some(ObjectType::Directory) {
            return Err(libc::EISDIR);
        }
        let size = usize::try_from(size).map_err(|_| EFBIG)?;
        if size > MAX_DATA_LEN {
            return Err(EFBIG);
        }
        let inode = to_remote_ino(ino);
        let existing = self.vfs.read(inode).map_err(|e| e.errno())?;
        if existing.len() != size {
            let content = resize_payload(existing.as_bytes(), size);
            self.vfs.write(inode, &content).map_err(|e| e.errno())?;
        }
        Ok(NodeAttr {
            ino,
            kind: ObjectType::File,
            size: size as u64,
        })
    }

    pub fn create(&mut self, parent: u64, name: &[u8]) -> Result<NodeAttr, i32> {
        let inode = self
            .vfs
            .create(to_remote_ino(parent), name)
            .map_err(|e| e.errno())?;
        self.remember(ObjectInfo::new(ObjectType::File, inode));
        Ok(NodeAttr {
            ino: to_fuse_ino(inode),
            kind: ObjectType::File,
            size: 0,
        })
    }

    pub fn mkdir(&mut self, parent: u64, name: &[u8]) -> Result<NodeAttr, i32> {
        let inode = self
            .vfs
            .mkdir(to_remote_ino(parent), name)
            .map_err(|e| e.errno())?;
        self.remember(ObjectInfo::new(ObjectType::Directory, inode));
        Ok(NodeAttr {
            ino: to_fuse_ino(inode),
            kind: ObjectType::Directory,
            size: 0,
        })
    }

    /// Add `newname` under `newparent` for an existing file.
    pub fn link(&mut self, ino: u64, newparent: u64, newname: &[u8]) -> Result<NodeAttr, i32> {
        let source = to_remote_ino(ino);
        if self.kinds.get(&source) == Some(&ObjectType::Directory) {
            return Err(libc::EPERM);
        }
        self.vfs
            .link(source, to_remote_ino(newparent), newname)
            .map_err(|e| e.errno())?;
        self.remember(ObjectInfo::new(ObjectType::File, source));
        self.attr_for(ObjectInfo::new(ObjectType::File, source))
    }

    pub fn unlink(&mut self, parent: u64, name: &[u8]) -> Result<(), i32> {
        self.vfs
            .unlink(to_remote_ino(parent), name)
            .map_err(|e| e.errno())
    }

    pub fn rmdir(&mut self, parent: u64, name: &[u8]) -> Result<(), i32> {
        let parent = to_remote_ino(parent);
        let removed = self.vfs.lookup(parent, name).ok();
        if let Some(info) = removed {
            if info.kind != ObjectType::Directory {
                return Err(ENOTDIR);
            }
        }
        self.vfs.rmdir(parent, name).map_err(|e| e.errno())?;
        if let Some(info) = removed {
            self.forget_remote(info.inode);
        }
        Ok(())
    }

    /// Drop cached knowledge about a kernel inode.
    pub fn forget(&mut self, ino: u64) {
        self.forget_remote(to_remote_ino(ino));
    }

    /// Check the server answers before mounting.
    pub fn probe(&self) -> Result<(), i32> {
        self.vfs.list(ROOT_INODE).map(|_| ()).map_err(|e| {
            warn!(error = %e, "remote root is not reachable");
            e.errno()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotefs_client::testing::{memory_client, LoopbackTransport};
    use remotefs_client::RemoteFsClient;
    use remotefs_proto::WireFormat;

    fn host() -> RemoteFsHost<RemoteFsClient<LoopbackTransport>> {
        RemoteFsHost::new(memory_client(WireFormat::Native))
    }

    #[test]
    fn inode_mapping_swaps_roots() {
        assert_eq!(to_fuse_ino(ROOT_INODE), FUSE_ROOT_INO);
        assert_eq!(to_fuse_ino(FUSE_ROOT_INO), ROOT_INODE);
        assert_eq!(to_fuse_ino(42), 42);
        for ino in [1, 2, 42, 1337, 1338] {
            assert_eq!(to_remote_ino(to_fuse_ino(ino)), ino);
        }
    }

    #[test]
    fn splice_overwrites_and_extends() {
        assert_eq!(splice_payload(b"hello", 1, b"EL"), b"hELlo");
        assert_eq!(splice_payload(b"hi", 4, b"!"), b"hi\0\0!");
        assert_eq!(splice_payload(b"", 0, b"abc"), b"abc");
        assert_eq!(resize_payload(b"hello", 2), b"he");
        assert_eq!(resize_payload(b"he", 4), b"he\0\0");
    }

    #[test]
    fn root_is_a_directory() {
        let host = host();
        let attr = host.getattr(FUSE_ROOT_INO).unwrap();
        assert_eq!(attr.kind, ObjectType::Directory);
        assert_eq!(attr.ino, FUSE_ROOT_INO);
    }

    #[test]
    fn missing_lookup_is_enoent() {
        let mut host = host();
        assert_eq!(host.lookup(FUSE_ROOT_INO, b"nope"), Err(ENOENT));
        assert_eq!(host.getattr(9999), Err(ENOENT));
    }

    #[test]
    fn long_name_is_enametoolong() {
        let mut host = host();
        let name = vec![b'x'; 300];
        assert_eq!(host.create(FUSE_ROOT_INO, &name), Err(libc::ENAMETOOLONG));
        assert_eq!(host.lookup(FUSE_ROOT_INO, &name), Err(libc::ENAMETOOLONG));
    }

    #[test]
    fn writes_at_offsets_are_spliced() {
        let mut host = host();
        let file = host.create(FUSE_ROOT_INO, b"notes").unwrap();
        assert_eq!(host.write(file.ino, 0, b"hello world").unwrap(), 11);
        assert_eq!(host.write(file.ino, 6, b"there").unwrap(), 5);
        assert_eq!(host.read(file.ino, 0, 64).unwrap(), b"hello there");
        assert_eq!(host.read(file.ino, 6, 3).unwrap(), b"the");
        assert_eq!(host.read(file.ino, 100, 3).unwrap(), b"");
        assert_eq!(host.getattr(file.ino).unwrap().size, 11);
    }

    #[test]
    fn oversized_write_is_efbig() {
        let mut host = host();
        let file = host.create(FUSE_ROOT_INO, b"big").unwrap();
        assert_eq!(host.write(file.ino, 1000, &[1u8; 25]), Err(EFBIG));
        assert_eq!(host.write(file.ino, 1000, &[1u8; 24]).unwrap(), 24);
        assert_eq!(host.getattr(file.ino).unwrap().size, 1024);
        assert_eq!(host.truncate(file.ino, 1025), Err(EFBIG));
    }

    #[test]
    fn truncate_shrinks_and_extends() {
        let mut host = host();
        let file = host.create(FUSE_ROOT_INO, b"t").unwrap();
        host.write(file.ino, 0, b"abcdef").unwrap();
        assert_eq!(host.truncate(file.ino, 3).unwrap().size, 3);
        assert_eq!(host.read(file.ino, 0, 16).unwrap(), b"abc");
        host.truncate(file.ino, 5).unwrap();
        assert_eq!(host.read(file.ino, 0, 16).unwrap(), b"abc\0\0");
    }

    #[test]
    fn readdir_resumes_from_offset() {
        let mut host = host();
        let a = host.create(FUSE_ROOT_INO, b"a").unwrap();
        let b = host.mkdir(FUSE_ROOT_INO, b"b").unwrap();
        host.create(FUSE_ROOT_INO, b"c").unwrap();

        let all = host.readdir(FUSE_ROOT_INO, 0).unwrap();
        let names: Vec<&[u8]> = all.iter().map(|e| e.name.as_slice()).collect();
        assert_eq!(names, vec![&b"a"[..], b"b", b"c"]);
        assert_eq!(all[0].ino, a.ino);
        assert_eq!(all[1].kind, ObjectType::Directory);
        assert_eq!(all[1].ino, b.ino);

        let rest = host.readdir(FUSE_ROOT_INO, all[1].next_offset).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, b"c");
        assert!(host.readdir(FUSE_ROOT_INO, 3).unwrap().is_empty());
    }

    #[test]
    fn listing_records_kinds() {
        let mut writer = host();
        writer.mkdir(FUSE_ROOT_INO, b"dir").unwrap();
        let store = writer.vfs().transport().store().clone();

        let mut reader = RemoteFsHost::new(RemoteFsClient::new(
            LoopbackTransport::with_store(WireFormat::Native, store),
            WireFormat::Native,
        ));
        let entries = reader.readdir(FUSE_ROOT_INO, 0).unwrap();
        assert_eq!(reader.kind_of(entries[0].ino), Some(ObjectType::Directory));
    }

    #[test]
    fn link_and_unlink() {
        let mut host = host();
        let file = host.create(FUSE_ROOT_INO, b"orig").unwrap();
        host.write(file.ino, 0, b"data").unwrap();
        let linked = host.link(file.ino, FUSE_ROOT_INO, b"alias").unwrap();
        assert_eq!(linked.ino, file.ino);
        assert_eq!(linked.size, 4);

        host.unlink(FUSE_ROOT_INO, b"orig").unwrap();
        let found = host.lookup(FUSE_ROOT_INO, b"alias").unwrap();
        assert_eq!(found.ino, file.ino);
        assert_eq!(host.unlink(FUSE_ROOT_INO, b"orig"), Err(libc::EIO));
    }

    #[test]
    fn link_to_directory_is_rejected() {
        let mut host = host();
        let dir = host.mkdir(FUSE_ROOT_INO, b"d").unwrap();
        assert_eq!(host.link(dir.ino, FUSE_ROOT_INO, b"d2"), Err(libc::EPERM));
    }

    #[test]
    fn rmdir_requires_empty_directory() {
        let mut host = host();
        let dir = host.mkdir(FUSE_ROOT_INO, b"d").unwrap();
        host.create(dir.ino, b"inner").unwrap();
        assert_eq!(host.rmdir(FUSE_ROOT_INO, b"d"), Err(libc::EIO));
        host.unlink(dir.ino, b"inner").unwrap();
        host.rmdir(FUSE_ROOT_INO, b"d").unwrap();
        assert_eq!(host.kind_of(dir.ino), None);

        host.create(FUSE_ROOT_INO, b"f").unwrap();
        assert_eq!(host.rmdir(FUSE_ROOT_INO, b"f"), Err(ENOTDIR));
    }

    #[test]
    fn probe_succeeds_against_live_store() {
        assert!(host().probe().is_ok());
    }
}
