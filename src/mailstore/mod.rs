//-
// Copyright (c) 2023, the Catchbox contributors
//
// This file is part of Catchbox.
//
// Catchbox is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Catchbox is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Catchbox. If not, see <http://www.gnu.org/licenses/>.

//! The file-backed mailbox index store.
//!
//! # Layout
//!
//! Everything lives under the `mail` directory of the configured base path.
//! Each mailbox gets a directory named by the hash of its normalised name,
//! nested under two shard directories named by the first 3 and first 6
//! characters of that hash:
//!
//! ```text
//! <base>/mail/3a7/3a7bd3/3a7bd3e2360a3d29eea436fcfb7e44c735d117c4.../index.cbor
//! ```
//!
//! A mailbox directory exists only while the mailbox has messages. The
//! directory holds the index, a file listing the metadata of every message
//! in the mailbox (see the `index` module). Message bodies are not stored
//! here, but whatever stores them may put them in the mailbox directory
//! (see `Message::raw_path()`).
//!
//! # Concurrency
//!
//! A `Store` may be cloned freely and used from any number of threads. See
//! the `locks` module for what is serialised and how callers should protect
//! read-modify-write sequences.

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::prelude::*;
use log::warn;

use crate::support::error::Error;
use crate::support::file_ops::AtPath;
use crate::support::system_config::DataStoreConfig;

pub mod address;
mod dirs;
pub mod id_gen;
mod index;
pub mod locks;
pub mod mailbox;
pub mod model;

pub use self::locks::{MailboxLock, StoreLocks};
pub use self::mailbox::Mailbox;
pub use self::model::{MailboxLocation, Message, MessageMetadata};

use self::address::{hash_mailbox_name, parse_mailbox_name, shard_path};
use self::id_gen::IdGenerator;

/// The root of the mail store, through which all mailboxes are accessed.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    mail_path: PathBuf,
    message_cap: usize,
    locks: Arc<StoreLocks>,
    ids: IdGenerator,
}

impl Store {
    /// Open the store described by `config`, creating its mail directory if
    /// needed.
    ///
    /// The store gets its own set of locks, so it does not contend with any
    /// other `Store` opened on the same path.
    pub fn new(config: &DataStoreConfig) -> Result<Self, Error> {
        Self::with_locks(config, Arc::new(StoreLocks::new()))
    }

    /// Like `new()`, but uses the given locks.
    ///
    /// Stores which are to be used on the same path concurrently must share
    /// their locks this way.
    pub fn with_locks(
        config: &DataStoreConfig,
        locks: Arc<StoreLocks>,
    ) -> Result<Self, Error> {
        if config.path.as_os_str().is_empty() {
            return Err(Error::NoDataStorePath);
        }

        let mail_path = config.path.join("mail");
        fs::DirBuilder::new()
            .recursive(true)
            .mode(dirs::DIR_MODE)
            .create(&mail_path)
            .at(&mail_path)?;

        Ok(Store {
            inner: Arc::new(StoreInner {
                path: config.path.clone(),
                mail_path,
                message_cap: config.mailbox_msg_cap,
                locks,
                ids: IdGenerator::start(),
            }),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.inner.path
    }

    pub fn mail_path(&self) -> &Path {
        &self.inner.mail_path
    }

    /// The configured maximum number of messages per mailbox, 0 if
    /// unlimited.
    ///
    /// This is advisory; see `Mailbox::append()`.
    pub fn message_cap(&self) -> usize {
        self.inner.message_cap
    }

    fn locks(&self) -> &StoreLocks {
        &self.inner.locks
    }

    /// Return a handle on the mailbox for the given address.
    ///
    /// This does not touch the file system; the mailbox need not exist yet.
    pub fn resolve(&self, address: &str) -> Result<Mailbox, Error> {
        let name = parse_mailbox_name(address)?;
        let dir_name = hash_mailbox_name(&name);
        let path = shard_path(&self.inner.mail_path, &dir_name);
        Ok(Mailbox::new(
            self.clone(),
            MailboxLocation::new(Some(name), dir_name, path),
        ))
    }

    /// Return a handle on every mailbox currently in the store, in no
    /// particular order.
    ///
    /// No indexes are read.
    pub fn enumerate_all(&self) -> Result<Vec<Mailbox>, Error> {
        let mut mailboxes = Vec::new();
        for (_, shard1) in subdirs(&self.inner.mail_path)? {
            for (_, shard2) in shard_subdirs(&shard1)? {
                for (dir_name, path) in shard_subdirs(&shard2)? {
                    mailboxes.push(Mailbox::new(
                        self.clone(),
                        MailboxLocation::new(None, dir_name, path),
                    ));
                }
            }
        }

        Ok(mailboxes)
    }

    /// Return the pool lock for the mailbox for the given address.
    ///
    /// The store never takes this lock itself.
    pub fn lock_for(&self, address: &str) -> Result<MailboxLock, Error> {
        let name = parse_mailbox_name(address)?;
        Ok(self.inner.locks.for_hash(&hash_mailbox_name(&name)))
    }

    /// Generate an identifier for a new message received at `date`.
    pub fn generate_id(&self, date: DateTime<Utc>) -> Result<String, Error> {
        self.inner.ids.generate_id(date)
    }
}

/// Like `subdirs`, but a shard removed by a concurrent cascade after its
/// parent was listed counts as empty.
fn shard_subdirs(path: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    match subdirs(path) {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        r => r,
    }
}

/// List the subdirectories of `path` as (name, path) pairs.
fn subdirs(path: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut ret = Vec::new();
    for entry in fs::read_dir(path).at(path)? {
        let entry = entry.at(path)?;
        let child = entry.path();
        if !entry.file_type().at(&child)?.is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => ret.push((name, child)),
            Err(_) => {
                warn!("Ignoring non-UTF-8 directory {}", child.display())
            }
        }
    }

    Ok(ret)
}

#[cfg(test)]
mod test_prelude {
    use tempfile::TempDir;

    use super::*;

    pub(super) struct Setup {
        pub root: TempDir,
        pub store: Store,
    }

    /// The receipt time used by `Setup::deliver`, so that IDs from one test
    /// share a timestamp prefix and differ only in their counter.
    pub(super) fn delivery_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 5, 13, 45, 2).unwrap()
    }

    pub(super) fn set_up() -> Setup {
        let root = TempDir::new().unwrap();
        let store = Store::new(&DataStoreConfig {
            path: root.path().join("data"),
            mailbox_msg_cap: 10,
        })
        .unwrap();
        Setup { root, store }
    }

    impl Setup {
        /// Deliver a message to `address` through a fresh handle, holding
        /// the mailbox lock throughout.
        pub fn deliver(&self, address: &str, subject: &str) -> Message {
            let lock = self.store.lock_for(address).unwrap();
            let _lock = lock.write().unwrap();

            let mut mailbox = self.store.resolve(address).unwrap();
            let metadata = mailbox
                .new_message(
                    delivery_date(),
                    "sender@example.org".to_owned(),
                    vec![address.to_owned()],
                    subject.to_owned(),
                    subject.len() as u64,
                )
                .unwrap();
            mailbox.append(metadata).unwrap()
        }
    }
}
