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

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// The name of the index file within each mailbox directory.
pub const INDEX_FILE_NAME: &str = "index.cbor";

/// Where a mailbox lives.
///
/// This is immutable once built, and shared between a mailbox handle and the
/// messages loaded through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxLocation {
    /// The normalised mailbox name.
    ///
    /// Mailboxes discovered by walking the store only know their hash, so
    /// this is `None` for them.
    pub(super) name: Option<String>,
    /// The hash-derived name of the mailbox directory.
    pub(super) dir_name: String,
    pub(super) path: PathBuf,
    pub(super) index_path: PathBuf,
}

impl MailboxLocation {
    pub(super) fn new(
        name: Option<String>,
        dir_name: String,
        path: PathBuf,
    ) -> Self {
        MailboxLocation {
            index_path: path.join(INDEX_FILE_NAME),
            name,
            dir_name,
            path,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }
}

impl fmt::Display for MailboxLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]",
            self.name.as_deref().unwrap_or(""),
            self.dir_name
        )
    }
}

/// The metadata of one message, as stored in the mailbox index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub id: String,
    pub date: DateTime<Utc>,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// The size of the raw message, in bytes.
    pub size: u64,
}

/// A message loaded from a mailbox index.
#[derive(Clone, Debug)]
pub struct Message {
    metadata: MessageMetadata,
    mailbox: Arc<MailboxLocation>,
}

impl Message {
    pub(super) fn new(
        metadata: MessageMetadata,
        mailbox: Arc<MailboxLocation>,
    ) -> Self {
        Message { metadata, mailbox }
    }

    pub fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> MessageMetadata {
        self.metadata
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.metadata.date
    }

    pub fn sender(&self) -> &str {
        &self.metadata.from
    }

    pub fn recipients(&self) -> &[String] {
        &self.metadata.to
    }

    pub fn subject(&self) -> &str {
        &self.metadata.subject
    }

    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    /// The mailbox this message was loaded from.
    pub fn mailbox(&self) -> &MailboxLocation {
        &self.mailbox
    }

    /// The path at which the raw content of this message is kept.
    ///
    /// The store never reads or writes this file; it exists for whatever
    /// stores message bodies alongside the index.
    pub fn raw_path(&self) -> PathBuf {
        self.mailbox.path.join(format!("{}.raw", self.metadata.id))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mailbox, self.metadata.id)
    }
}
