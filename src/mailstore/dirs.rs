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

//! Creation and removal of mailbox directories.
//!
//! A mailbox directory exists exactly while the mailbox has messages. When
//! it is removed, the two shard directories above it are removed too if that
//! leaves them empty, so that the tree does not fill up with empty shards.

use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use log::{error, trace};

use super::locks::StoreLocks;
use crate::support::error::Error;
use crate::support::file_ops::{AtPath, IgnoreKinds};

/// Permissions for mailbox and shard directories.
pub const DIR_MODE: u32 = 0o770;

/// Create `path`, along with any missing shard directories above it.
///
/// Does nothing if it already exists.
pub fn create_dir(locks: &StoreLocks, path: &Path) -> Result<(), Error> {
    let _lock = locks.dirs();
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .map_err(|e| {
            error!("Failed to create directory {}: {}", path.display(), e);
            e
        })
        .at(path)
}

/// Recursively remove the mailbox directory at `path`, then its parent and
/// grandparent shard directories if they are left empty.
///
/// A mailbox directory which does not exist is not an error. Failure to
/// remove the shard directories is not an error either; they are simply left
/// for whichever mailbox is removed from them next.
pub fn remove_dir(locks: &StoreLocks, path: &Path) -> Result<(), Error> {
    let _lock = locks.dirs();
    fs::remove_dir_all(path).ignore_not_found().at(path)?;

    if let Some(shard2) = path.parent() {
        if remove_dir_if_empty(shard2) {
            if let Some(shard1) = shard2.parent() {
                remove_dir_if_empty(shard1);
            }
        }
    }

    Ok(())
}

/// Remove `path` if it is an empty directory. Returns whether it was
/// removed.
///
/// The caller must hold the directory lock.
fn remove_dir_if_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut it) => {
            if it.next().is_some() {
                return false;
            }
        }
        Err(_) => return false,
    }

    trace!("Removing dir {}", path.display());
    match fs::remove_dir(path) {
        Ok(()) => true,
        // Lost a race with something not respecting the directory lock, or
        // the directory was never there; either way it's not ours to remove
        Err(e) if io::ErrorKind::NotFound == e.kind() => false,
        Err(e) => {
            error!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod test {
    use std::os::unix::fs::MetadataExt;

    use tempfile::TempDir;

    use super::*;

    struct Setup {
        root: TempDir,
        locks: StoreLocks,
    }

    fn set_up() -> Setup {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("mail")).unwrap();
        Setup {
            root,
            locks: StoreLocks::new(),
        }
    }

    impl Setup {
        fn mail(&self) -> std::path::PathBuf {
            self.root.path().join("mail")
        }
    }

    #[test]
    fn create_is_idempotent() {
        let setup = set_up();
        let path = setup.mail().join("abc/abcdef/abcdef0123");

        create_dir(&setup.locks, &path).unwrap();
        assert!(path.is_dir());
        // The umask may clear group bits, but never the owner's
        assert_eq!(0o700, fs::metadata(&path).unwrap().mode() & 0o700);

        fs::write(path.join("index.cbor"), b"x").unwrap();
        create_dir(&setup.locks, &path).unwrap();
        assert!(path.join("index.cbor").is_file());
    }

    #[test]
    fn remove_cascades_to_empty_shards() {
        let setup = set_up();
        let path = setup.mail().join("abc/abcdef/abcdef0123");
        create_dir(&setup.locks, &path).unwrap();
        fs::write(path.join("index.cbor"), b"x").unwrap();

        remove_dir(&setup.locks, &path).unwrap();
        assert!(!setup.mail().join("abc").exists());
        assert!(setup.mail().is_dir());
    }

    #[test]
    fn remove_keeps_occupied_shards() {
        let setup = set_up();
        let a = setup.mail().join("abc/abcdef/abcdef0123");
        let b = setup.mail().join("abc/abcdef/abcdef4567");
        let c = setup.mail().join("abc/abc999/abc9990123");
        create_dir(&setup.locks, &a).unwrap();
        create_dir(&setup.locks, &b).unwrap();
        create_dir(&setup.locks, &c).unwrap();

        remove_dir(&setup.locks, &a).unwrap();
        assert!(!a.exists());
        assert!(b.is_dir());

        remove_dir(&setup.locks, &b).unwrap();
        assert!(!setup.mail().join("abc/abcdef").exists());
        assert!(c.is_dir());

        remove_dir(&setup.locks, &c).unwrap();
        assert!(!setup.mail().join("abc").exists());
        assert!(setup.mail().is_dir());
    }

    #[test]
    fn remove_nonexistent_is_ok() {
        let setup = set_up();
        let path = setup.mail().join("abc/abcdef/abcdef0123");
        remove_dir(&setup.locks, &path).unwrap();
        assert!(setup.mail().is_dir());
    }
}
