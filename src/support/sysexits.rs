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

//! Process exit codes, following the `sysexits.h` conventions so that the
//! command-line tool composes with mail tooling that already understands
//! them.

use crate::support::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::InvalidAddress(..) => EX_USAGE,
            Error::NxMessage => EX_NOINPUT,
            Error::CorruptIndex { .. } => EX_DATAERR,
            Error::Io { .. } | Error::Cbor(..) => EX_IOERR,
            Error::NoDataStorePath | Error::Config(..) => EX_CONFIG,
            Error::IdGeneratorStopped => EX_SOFTWARE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn errors_map_to_exit_codes() {
        assert_eq!(
            EX_USAGE,
            Sysexit::from(&Error::InvalidAddress("x".to_owned()))
        );
        assert_eq!(EX_NOINPUT, Sysexit::from(&Error::NxMessage));
        assert_eq!(EX_CONFIG, Sysexit::from(&Error::NoDataStorePath));
    }
}
