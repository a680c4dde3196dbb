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

//! Miscellaneous functions for working with files.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::support::error::Error;

/// Write a file at `path`, atomically.
///
/// `write` is handed a buffered writer onto a staging file created within
/// `tmp`, which must be on the same file system as `path`. Once `write`
/// returns successfully, the staging file is flushed, given `mode`, synced,
/// and renamed over whatever is currently at `path`.
///
/// If anything fails, the staging file is deleted and `path` is untouched.
pub fn spit_with(
    tmp: &Path,
    path: &Path,
    mode: u32,
    write: impl FnOnce(&mut BufWriter<&mut fs::File>) -> Result<(), Error>,
) -> Result<(), Error> {
    let mut tf = tempfile::NamedTempFile::new_in(tmp).at(tmp)?;
    {
        let mut writer = BufWriter::new(tf.as_file_mut());
        write(&mut writer)?;
        writer.flush().at(path)?;
    }
    chmod(tf.path(), mode).at(path)?;
    tf.as_file_mut().sync_all().at(path)?;
    tf.persist(path).map_err(|e| e.error).at(path)?;
    Ok(())
}

pub fn chmod(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

pub trait IgnoreKinds {
    fn ignore_not_found(self) -> Self;
}

impl<R: Default> IgnoreKinds for Result<R, io::Error> {
    fn ignore_not_found(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(R::default()),
            Err(e) => Err(e),
        }
    }
}

/// Attaches the path an I/O operation was working on to its error.
pub trait AtPath {
    type Coerced;
    fn at(self, path: impl AsRef<Path>) -> Self::Coerced;
}

impl<R> AtPath for io::Result<R> {
    type Coerced = Result<R, Error>;

    fn at(self, path: impl AsRef<Path>) -> Result<R, Error> {
        self.map_err(|source| Error::Io {
            path: path.as_ref().to_owned(),
            source,
        })
    }
}
