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

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mailbox address: {0}")]
    InvalidAddress(String),
    #[error("No such message")]
    NxMessage,
    #[error("Corrupt mailbox index {}: {source}", .path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_cbor::error::Error,
    },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Message ID generator has been stopped")]
    IdGeneratorStopped,
    #[error("No value configured for datastore path")]
    NoDataStorePath,
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Cbor(#[from] serde_cbor::error::Error),
}

impl Error {
    /// Whether this error indicates that the requested message or mailbox
    /// content simply isn't there, as opposed to something having gone wrong.
    pub fn is_not_found(&self) -> bool {
        match *self {
            Error::NxMessage => true,
            Error::Io { ref source, .. } => {
                io::ErrorKind::NotFound == source.kind()
            }
            _ => false,
        }
    }
}
