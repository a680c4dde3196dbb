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
use std::path::Path;
use std::sync::Arc;

use chrono::prelude::*;

use super::index;
use super::model::{MailboxLocation, Message, MessageMetadata};
use super::Store;
use crate::support::error::Error;

/// The pseudo-identifier which `Mailbox::message()` resolves to the most
/// recently added message.
pub const LATEST: &str = "latest";

/// The in-memory state of a mailbox's index.
#[derive(Debug)]
enum IndexState {
    /// Nothing has been read from disk yet.
    Unloaded,
    /// The messages as of the last read or successful write, oldest first.
    Loaded(Vec<Message>),
}

/// A handle on the messages of one recipient.
///
/// Every call to `Store::resolve()` produces a new, independent handle. The
/// index is read on first use and cached in the handle from then on, so a
/// handle sees its own writes but not those made through other handles.
/// Read-modify-write sequences that must not interleave with other handles
/// need to be done while holding `Store::lock_for()`.
pub struct Mailbox {
    store: Store,
    location: Arc<MailboxLocation>,
    index: IndexState,
}

impl Mailbox {
    pub(super) fn new(store: Store, location: MailboxLocation) -> Self {
        Mailbox {
            store,
            location: Arc::new(location),
            index: IndexState::Unloaded,
        }
    }

    /// The normalised name of this mailbox, if known.
    ///
    /// Mailboxes found by `Store::enumerate_all()` only know their hash.
    pub fn name(&self) -> Option<&str> {
        self.location.name()
    }

    pub fn dir_name(&self) -> &str {
        self.location.dir_name()
    }

    pub fn path(&self) -> &Path {
        self.location.path()
    }

    pub fn index_path(&self) -> &Path {
        self.location.index_path()
    }

    pub fn location(&self) -> &MailboxLocation {
        &self.location
    }

    /// Whether the index has been read (or written) through this handle.
    pub fn is_loaded(&self) -> bool {
        matches!(self.index, IndexState::Loaded(..))
    }

    /// Return all messages in this mailbox, oldest first.
    pub fn messages(&mut self) -> Result<Vec<Message>, Error> {
        Ok(self.loaded()?.clone())
    }

    /// Return the number of messages in this mailbox.
    pub fn len(&mut self) -> Result<usize, Error> {
        Ok(self.loaded()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, Error> {
        Ok(self.loaded()?.is_empty())
    }

    /// Return the message with the given identifier.
    ///
    /// `"latest"` names the most recently added message, since messages are
    /// only ever appended.
    pub fn message(&mut self, id: &str) -> Result<Message, Error> {
        let messages = self.loaded()?;

        if LATEST == id {
            if let Some(last) = messages.last() {
                return Ok(last.clone());
            }
        }

        messages
            .iter()
            .find(|m| m.id() == id)
            .cloned()
            .ok_or(Error::NxMessage)
    }

    /// Build the metadata for a new message, allocating it an identifier.
    ///
    /// Nothing is written; pass the result to `append()` to add it to the
    /// mailbox.
    pub fn new_message(
        &self,
        date: DateTime<Utc>,
        from: String,
        to: Vec<String>,
        subject: String,
        size: u64,
    ) -> Result<MessageMetadata, Error> {
        Ok(MessageMetadata {
            id: self.store.generate_id(date)?,
            date,
            from,
            to,
            subject,
            size,
        })
    }

    /// Add a message to the end of this mailbox and write the index.
    ///
    /// This does not look at the mailbox message cap; callers are expected to
    /// `remove()` old messages first if they want to honour it.
    ///
    /// If writing fails, the message remains in this handle but it is unknown
    /// whether it reached the disk.
    pub fn append(
        &mut self,
        metadata: MessageMetadata,
    ) -> Result<Message, Error> {
        let message = Message::new(metadata, Arc::clone(&self.location));
        self.loaded()?.push(message.clone());
        self.persist()?;
        Ok(message)
    }

    /// Remove the message with the given identifier and write the index.
    ///
    /// Removing the last message removes the mailbox directory.
    pub fn remove(&mut self, id: &str) -> Result<(), Error> {
        let messages = self.loaded()?;
        let ix = messages
            .iter()
            .position(|m| m.id() == id)
            .ok_or(Error::NxMessage)?;
        messages.remove(ix);
        self.persist()
    }

    /// Delete every message in this mailbox, along with its directory.
    ///
    /// This does not need to read the index, so it also works on a mailbox
    /// whose index is corrupt.
    pub fn purge(&mut self) -> Result<(), Error> {
        self.index = IndexState::Loaded(Vec::new());
        self.persist()
    }

    fn loaded(&mut self) -> Result<&mut Vec<Message>, Error> {
        if !self.is_loaded() {
            let messages = self.read()?;
            self.index = IndexState::Loaded(messages);
        }

        match self.index {
            IndexState::Loaded(ref mut messages) => Ok(messages),
            IndexState::Unloaded => unreachable!("index not loaded"),
        }
    }

    fn read(&self) -> Result<Vec<Message>, Error> {
        let records =
            index::read_index(self.store.locks(), self.location.index_path())?
                .unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|m| Message::new(m, Arc::clone(&self.location)))
            .collect())
    }

    fn persist(&self) -> Result<(), Error> {
        let messages: &[Message] = match self.index {
            IndexState::Loaded(ref messages) => messages,
            // Nothing was changed without loading first
            IndexState::Unloaded => return Ok(()),
        };

        index::write_index(
            self.store.locks(),
            self.location.path(),
            self.location.index_path(),
            messages,
        )
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.location, f)
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("location", &self.location)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::super::test_prelude::*;
    use super::*;

    #[test]
    fn empty_mailbox() {
        let setup = set_up();
        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();

        assert!(mailbox.messages().unwrap().is_empty());
        assert!(mailbox.is_loaded());
        assert_eq!(0, mailbox.len().unwrap());
        assert_matches!(Err(Error::NxMessage), mailbox.message(LATEST));
        assert_matches!(Err(Error::NxMessage), mailbox.message("anything"));
        assert!(!mailbox.path().exists());
    }

    #[test]
    fn messages_round_trip_in_order() {
        let setup = set_up();
        let written: Vec<_> = (0..3)
            .map(|i| setup.deliver("bob@example.com", &format!("m{}", i)))
            .map(Message::into_metadata)
            .collect();

        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        let read: Vec<_> = mailbox
            .messages()
            .unwrap()
            .into_iter()
            .map(Message::into_metadata)
            .collect();
        assert_eq!(written, read);
    }

    #[test]
    fn message_lookup() {
        let setup = set_up();
        let first = setup.deliver("bob@example.com", "first");
        let second = setup.deliver("bob@example.com", "second");

        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        assert_eq!(
            first.metadata(),
            mailbox.message(first.id()).unwrap().metadata()
        );
        assert_eq!(
            second.metadata(),
            mailbox.message(LATEST).unwrap().metadata()
        );
        assert_matches!(Err(Error::NxMessage), mailbox.message("nope"));

        let found = mailbox.message(first.id()).unwrap();
        assert_eq!(mailbox.path(), found.mailbox().path());
        assert_eq!(
            mailbox.path().join(format!("{}.raw", first.id())),
            found.raw_path()
        );
    }

    #[test]
    fn handle_sees_own_writes_only() {
        let setup = set_up();
        let mut a = setup.store.resolve("bob@example.com").unwrap();
        let mut b = setup.store.resolve("bob@example.com").unwrap();
        assert_eq!(0, a.len().unwrap());
        assert_eq!(0, b.len().unwrap());

        let metadata = a
            .new_message(
                delivery_date(),
                "x@example.org".to_owned(),
                vec![],
                "s".to_owned(),
                1,
            )
            .unwrap();
        a.append(metadata).unwrap();

        assert_eq!(1, a.len().unwrap());
        // b already loaded the index and does not reload it
        assert_eq!(0, b.len().unwrap());
        assert_eq!(1, setup.store.resolve("bob").unwrap().len().unwrap());
    }

    #[test]
    fn remove_messages() {
        let setup = set_up();
        let first = setup.deliver("bob@example.com", "first");
        let second = setup.deliver("bob@example.com", "second");

        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        assert_matches!(Err(Error::NxMessage), mailbox.remove("nope"));

        mailbox.remove(first.id()).unwrap();
        let mut reread = setup.store.resolve("bob@example.com").unwrap();
        let remaining = reread.messages().unwrap();
        assert_eq!(1, remaining.len());
        assert_eq!(second.id(), remaining[0].id());

        mailbox.remove(second.id()).unwrap();
        assert!(!mailbox.path().exists());
    }

    #[test]
    fn purge_removes_everything() {
        let setup = set_up();
        setup.deliver("bob@example.com", "first");
        setup.deliver("bob@example.com", "second");

        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        mailbox.purge().unwrap();
        assert_eq!(0, mailbox.len().unwrap());
        assert!(!mailbox.path().exists());

        assert!(setup
            .store
            .resolve("bob@example.com")
            .unwrap()
            .messages()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn purge_empty_mailbox_is_ok() {
        let setup = set_up();
        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        mailbox.purge().unwrap();
        mailbox.purge().unwrap();
        assert!(!mailbox.path().exists());
        assert!(setup.store.enumerate_all().unwrap().is_empty());
    }

    #[test]
    fn truncated_index_fails_to_load() {
        let setup = set_up();
        setup.deliver("bob@example.com", "first");
        setup.deliver("bob@example.com", "second");

        let mut mailbox = setup.store.resolve("bob@example.com").unwrap();
        let data = fs::read(mailbox.index_path()).unwrap();
        fs::write(mailbox.index_path(), &data[..data.len() - 1]).unwrap();

        assert_matches!(
            Err(Error::CorruptIndex { .. }),
            mailbox.messages()
        );
        // Nothing partial was kept
        assert!(!mailbox.is_loaded());
        assert_matches!(
            Err(Error::CorruptIndex { .. }),
            mailbox.message(LATEST)
        );

        // Purging does not need to read, so it recovers the mailbox
        mailbox.purge().unwrap();
        assert!(!mailbox.path().exists());
    }

    #[test]
    fn display_shows_name_and_dir() {
        let setup = set_up();
        let mailbox = setup.store.resolve("bob@example.com").unwrap();
        assert_eq!(
            format!("bob[{}]", mailbox.dir_name()),
            mailbox.to_string()
        );
    }
}
