// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Capability set a host filesystem front end delegates to.

use crate::client::RemoteFsClient;
use crate::error::ClientResult;
use crate::transport::Transport;
use remotefs_proto::{Data, Inode, ObjectInfo, Objects};

/// Filesystem operations backed by the remote object server.
///
/// Names are raw bytes. Front ends own naming policy, permissions and
/// caching; implementations only translate each call into one exchange.
pub trait VfsOperations: Send + Sync {
    fn lookup(&self, parent: Inode, name: &[u8]) -> ClientResult<ObjectInfo>;

    fn create(&self, parent: Inode, name: &[u8]) -> ClientResult<Inode>;

    fn mkdir(&self, parent: Inode, name: &[u8]) -> ClientResult<Inode>;

    fn rmdir(&self, parent: Inode, name: &[u8]) -> ClientResult<()>;

    fn link(&self, source: Inode, parent: Inode, name: &[u8]) -> ClientResult<()>;

    fn unlink(&self, parent: Inode, name: &[u8]) -> ClientResult<()>;

    /// Entire payload of `inode`.
    fn read(&self, inode: Inode) -> ClientResult<Data>;

    /// Replace the entire payload of `inode`.
    fn write(&self, inode: Inode, content: &[u8]) -> ClientResult<()>;

    fn list(&self, inode: Inode) -> ClientResult<Objects>;
}

impl<T: Transport> VfsOperations for RemoteFsClient<T> {
    fn lookup(&self, parent: Inode, name: &[u8]) -> ClientResult<ObjectInfo> {
        RemoteFsClient::lookup(self, parent, name)
    }

    fn create(&self, parent: Inode, name: &[u8]) -> ClientResult<Inode> {
        self.create_file(parent, name)
    }

    fn mkdir(&self, parent: Inode, name: &[u8]) -> ClientResult<Inode> {
        RemoteFsClient::mkdir(self, parent, name)
    }

    fn rmdir(&self, parent: Inode, name: &[u8]) -> ClientResult<()> {
        RemoteFsClient::rmdir(self, parent, name)
    }

    fn link(&self, source: Inode, parent: Inode, name: &[u8]) -> ClientResult<()> {
        RemoteFsClient::link(self, source, parent, name)
    }

    fn unlink(&self, parent: Inode, name: &[u8]) -> ClientResult<()> {
        RemoteFsClient::unlink(self, parent, name)
    }

    fn read(&self, inode: Inode) -> ClientResult<Data> {
        RemoteFsClient::read(self, inode)
    }

    fn write(&self, inode: Inode, content: &[u8]) -> ClientResult<()> {
        RemoteFsClient::write(self, inode, content)
    }

    fn list(&self, inode: Inode) -> ClientResult<Objects> {
        RemoteFsClient::list(self, inode)
    }
}
