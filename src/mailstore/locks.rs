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

//! The lock domains guarding a store.
//!
//! There are three, and they are independent of each other:
//!
//! - The index lock is held shared while reading any index file and
//!   exclusively while writing one. It covers every mailbox in the store, so
//!   all index I/O is serialised against writers. That is a known ceiling on
//!   throughput with many busy mailboxes.
//!
//! - The directory lock is held while creating or removing any mailbox
//!   directory, so that one mailbox's cleanup cannot remove a shard directory
//!   out from under another mailbox being created in it.
//!
//! - The mailbox lock pool is never taken by the store itself. It is handed
//!   out to callers that need a read-modify-write sequence on one mailbox
//!   (e.g. delivery) to be atomic with respect to other such sequences.
//!   Mailboxes share a slot when their hashes share a three-digit prefix;
//!   that only ever causes extra contention, never missing exclusion.
//!
//! When nesting, a mailbox lock must be taken before the index lock, and the
//! index lock before the directory lock.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

/// The number of slots in the mailbox lock pool.
///
/// This is 16³, one slot per possible first-level shard directory.
pub const LOCK_POOL_SIZE: usize = 4096;

/// A lock from the mailbox lock pool.
pub type MailboxLock = Arc<RwLock<()>>;

pub struct StoreLocks {
    index: RwLock<()>,
    dirs: Mutex<()>,
    pool: Vec<MailboxLock>,
}

impl Default for StoreLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreLocks {
    pub fn new() -> Self {
        StoreLocks {
            index: RwLock::new(()),
            dirs: Mutex::new(()),
            pool: (0..LOCK_POOL_SIZE)
                .map(|_| Arc::new(RwLock::new(())))
                .collect(),
        }
    }

    // All the locks guard `()`, so a panic while one was held cannot have
    // left anything inconsistent in memory and poisoning is ignored.

    pub fn read_index(&self) -> RwLockReadGuard<'_, ()> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_index(&self) -> RwLockWriteGuard<'_, ()> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dirs(&self) -> MutexGuard<'_, ()> {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the pool lock for the mailbox whose directory hash is `hash`.
    pub fn for_hash(&self, hash: &str) -> MailboxLock {
        Arc::clone(&self.pool[slot_for_hash(hash)])
    }
}

fn slot_for_hash(hash: &str) -> usize {
    hash.get(..3)
        .and_then(|prefix| usize::from_str_radix(prefix, 16).ok())
        .unwrap_or(0)
        % LOCK_POOL_SIZE
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn slot_selection() {
        assert_eq!(0, slot_for_hash("000fff"));
        assert_eq!(0xabc, slot_for_hash("abc123"));
        assert_eq!(0xfff, slot_for_hash("fffffff"));
        // Not a hash at all; must still land somewhere
        assert_eq!(0, slot_for_hash("x"));
    }

    #[test]
    fn same_prefix_shares_lock() {
        let locks = StoreLocks::new();
        assert!(Arc::ptr_eq(
            &locks.for_hash("abc111"),
            &locks.for_hash("abc999")
        ));
        assert!(!Arc::ptr_eq(
            &locks.for_hash("abc111"),
            &locks.for_hash("abd111")
        ));
    }

    #[test]
    fn index_readers_share() {
        let locks = StoreLocks::new();
        let _a = locks.read_index();
        let _b = locks.read_index();
        assert!(locks.index.try_write().is_err());
    }

    #[test]
    fn index_writer_excludes_readers() {
        let locks = Arc::new(StoreLocks::new());
        let guard = locks.write_index();

        let (tx, rx) = mpsc::channel();
        let locks2 = Arc::clone(&locks);
        let reader = std::thread::spawn(move || {
            let _g = locks2.read_index();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn poisoned_locks_still_usable() {
        let locks = Arc::new(StoreLocks::new());
        let locks2 = Arc::clone(&locks);
        let _ = std::thread::spawn(move || {
            let _g = locks2.dirs();
            panic!("poison");
        })
        .join();

        drop(locks.dirs());
    }
}
