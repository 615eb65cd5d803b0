// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! RemoteFS FUSE adapter implementation
//!
//! Maps FUSE operations onto [`RemoteFsHost`] calls.

#[cfg(not(all(feature = "fuse", target_os = "linux")))]
compile_error!("This module requires the 'fuse' feature on Linux");

use crate::config::MountConfig;
use crate::host::{NodeAttr, RemoteFsHost};
use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request, TimeOrNow,
};
use remotefs_client::VfsOperations;
use remotefs_proto::ObjectType;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const BLOCK_SIZE: u32 = 512;

pub struct RemoteFsFuse<V> {
    host: RemoteFsHost<V>,
    attr_ttl: Duration,
    entry_ttl: Duration,
    mounted_at: SystemTime,
}

impl<V: VfsOperations> RemoteFsFuse<V> {
    pub fn new(vfs: V, config: &MountConfig) -> Self {
        Self {
            host: RemoteFsHost::new(vfs),
            attr_ttl: config.attr_ttl(),
            entry_ttl: config.entry_ttl(),
            mounted_at: SystemTime::now(),
        }
    }

    /// Attributes for `node`, owned by whoever issued `req`.
    fn file_attr(&self, req: &Request, node: &NodeAttr) -> FileAttr {
        synthesize_attr(node, req.uid(), req.gid(), self.mounted_at)
    }

    fn reply_entry(&self, req: &Request, result: Result<NodeAttr, i32>, reply: ReplyEntry) {
        match result {
            Ok(node) => reply.entry(&self.entry_ttl, &self.file_attr(req, &node), 0),
            Err(errno) => reply.error(errno),
        }
    }
}

// The server keeps no ownership or timestamps.
fn synthesize_attr(node: &NodeAttr, uid: u32, gid: u32, at: SystemTime) -> FileAttr {
    let (kind, perm, nlink) = match node.kind {
        ObjectType::Directory => (FileType::Directory, 0o755, 2),
        ObjectType::File => (FileType::RegularFile, 0o644, 1),
    };
    FileAttr {
        ino: node.ino,
        size: node.size,
        blocks: node.size.div_ceil(BLOCK_SIZE as u64),
        atime: at,
        mtime: at,
        ctime: at,
        crtime: at,
        kind,
        perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn file_type(kind: ObjectType) -> FileType {
    match kind {
        ObjectType::Directory => FileType::Directory,
        ObjectType::File => FileType::RegularFile,
    }
}

impl<V: VfsOperations + 'static> fuser::Filesystem for RemoteFsFuse<V> {
    fn init(
        &mut self,
        _req: &Request,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        self.host.probe()?;
        info!("remote root reachable, filesystem ready");
        Ok(())
    }

    fn forget(&mut self, _req: &Request, ino: u64, _nlookup: u64) {
        self.host.forget(ino);
    }

    fn lookup(&mut self, req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let result = self.host.lookup(parent, name.as_bytes());
        self.reply_entry(req, result, reply);
    }

    fn getattr(&mut self, req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.host.getattr(ino) {
            Ok(node) => reply.attr(&self.attr_ttl, &self.file_attr(req, &node)),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // Only size changes reach the server; other attributes are synthesized.
        let result = match size {
            Some(size) => self.host.truncate(ino, size),
            None => self.host.getattr(ino),
        };
        match result {
            Ok(node) => reply.attr(&self.attr_ttl, &self.file_attr(req, &node)),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.host.read(ino, offset, size) {
            Ok(bytes) => reply.data(&bytes),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!(ino, offset, len = data.len(), "write");
        match self.host.write(ino, offset, data) {
            Ok(written) => reply.written(written),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        match self.host.readdir(ino, offset) {
            Ok(entries) => {
                for entry in entries {
                    let name = OsStr::from_bytes(&entry.name);
                    if reply.add(entry.ino, entry.next_offset, file_type(entry.kind), name) {
                        break;
                    }
                }
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        match self.host.create(parent, name.as_bytes()) {
            Ok(node) => reply.created(&self.entry_ttl, &self.file_attr(req, &node), 0, 0, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let result = self.host.mkdir(parent, name.as_bytes());
        self.reply_entry(req, result, reply);
    }

    fn link(
        &mut self,
        req: &Request,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let result = self.host.link(ino, newparent, newname.as_bytes());
        self.reply_entry(req, result, reply);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.host.unlink(parent, name.as_bytes()) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match self.host.rmdir(parent, name.as_bytes()) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_carry_caller_identity() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let file = NodeAttr {
            ino: 2,
            kind: ObjectType::File,
            size: 1024,
        };
        let attr = synthesize_attr(&file, 1000, 100, at);
        assert_eq!((attr.uid, attr.gid), (1000, 100));
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o644);
        assert_eq!(attr.blocks, 2);
        assert_eq!(attr.mtime, at);

        let dir = NodeAttr {
            ino: 1,
            kind: ObjectType::Directory,
            size: 0,
        };
        let attr = synthesize_attr(&dir, 0, 0, at);
        assert_eq!((attr.uid, attr.gid), (0, 0));
        assert_eq!((attr.kind, attr.perm, attr.nlink), (FileType::Directory, 0o755, 2));
    }
}
