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

//! Reading and writing mailbox index files.
//!
//! An index file is nothing but the CBOR encodings of each message's
//! metadata, back to back, oldest first. There is no header, count, or length
//! prefix; reading simply stops at the end of the file. Since CBOR is
//! self-delimiting, a file cut off partway through a record is detected as
//! corrupt instead of silently losing the tail.
//!
//! A mailbox with no messages has no index file at all.

use std::fs;
use std::io::{self, BufReader, Read};
use std::path::Path;

use log::trace;

use super::dirs;
use super::locks::StoreLocks;
use super::model::{Message, MessageMetadata};
use crate::support::error::Error;
use crate::support::file_ops::{self, AtPath};

/// Permissions for index files.
pub const INDEX_FILE_MODE: u32 = 0o660;

/// Load the index at `index_path`.
///
/// Returns `None` if there is no index file, which just means the mailbox is
/// empty.
pub fn read_index(
    locks: &StoreLocks,
    index_path: &Path,
) -> Result<Option<Vec<MessageMetadata>>, Error> {
    let _lock = locks.read_index();

    let file = match fs::File::open(index_path) {
        Ok(f) => f,
        Err(e) if io::ErrorKind::NotFound == e.kind() => {
            trace!("Index {} does not exist (yet)", index_path.display());
            return Ok(None);
        }
        Err(e) => return Err(e).at(index_path),
    };

    decode_records(BufReader::new(file), index_path).map(Some)
}

/// Decode every record in `reader`, which holds the index at `index_path`.
///
/// Any failure other than a clean end of input discards everything decoded
/// so far.
pub fn decode_records(
    reader: impl Read,
    index_path: &Path,
) -> Result<Vec<MessageMetadata>, Error> {
    serde_cbor::Deserializer::from_reader(reader)
        .into_iter::<MessageMetadata>()
        .map(|r| {
            r.map_err(|e| {
                if e.is_io() {
                    Error::Io {
                        path: index_path.to_owned(),
                        source: io::Error::new(io::ErrorKind::Other, e),
                    }
                } else {
                    Error::CorruptIndex {
                        path: index_path.to_owned(),
                        source: e,
                    }
                }
            })
        })
        .collect()
}

/// Replace the index of the mailbox at `mailbox_path` with `messages`.
///
/// If `messages` is non-empty, the mailbox directory is created if needed
/// and the new index is staged in it and renamed over the old one, so a
/// crash leaves either the old or the new index in place. If `messages` is
/// empty, the whole mailbox directory is removed instead.
pub fn write_index(
    locks: &StoreLocks,
    mailbox_path: &Path,
    index_path: &Path,
    messages: &[Message],
) -> Result<(), Error> {
    let _lock = locks.write_index();

    if messages.is_empty() {
        trace!("Removing mailbox {}", mailbox_path.display());
        return dirs::remove_dir(locks, mailbox_path);
    }

    dirs::create_dir(locks, mailbox_path)?;
    file_ops::spit_with(mailbox_path, index_path, INDEX_FILE_MODE, |w| {
        for message in messages {
            serde_cbor::to_writer(&mut *w, message.metadata())?;
        }
        Ok(())
    })
}
