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

//! The administrative subcommands.

use std::io::{self, Write};

use log::info;

use super::main::Command;
use crate::mailstore::{Mailbox, Store};
use crate::support::error::Error;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

pub(super) fn run(config: &SystemConfig, command: Command) -> Sysexit {
    let store = match Store::new(&config.datastore) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Unable to open store: {}", e);
            return Sysexit::from(&e);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match command {
        Command::List => list(&store, &mut out),
        Command::Show { address } => show(&store, &address, &mut out),
        Command::Purge { address } => purge(&store, &address),
        Command::Remove { address, id } => remove(&store, &address, &id),
    };

    match result {
        Ok(exit) => exit,
        Err(e) => {
            eprintln!("{}", e);
            Sysexit::from(&e)
        }
    }
}

/// Print the directory, path and message count of every mailbox.
///
/// A mailbox whose index can't be read is reported and skipped, but makes
/// the whole command fail at the end.
fn list(store: &Store, out: &mut impl Write) -> Result<Sysexit, Error> {
    let mut exit = EX_OK;
    for mut mailbox in store.enumerate_all()? {
        match mailbox.len() {
            Ok(count) => print_line(
                out,
                format_args!(
                    "{}\t{}\t{}",
                    mailbox.dir_name(),
                    mailbox.path().display(),
                    count
                ),
            )?,
            Err(e) => {
                eprintln!("{}: {}", mailbox, e);
                exit = Sysexit::from(&e);
            }
        }
    }

    Ok(exit)
}

fn show(
    store: &Store,
    address: &str,
    out: &mut impl Write,
) -> Result<Sysexit, Error> {
    let mut mailbox = store.resolve(address)?;
    for message in mailbox.messages()? {
        print_line(
            out,
            format_args!(
                "{}\t{}\t{}\t{}\t{}",
                message.id(),
                message.date().to_rfc3339(),
                message.sender(),
                message.size(),
                message.subject(),
            ),
        )?;
    }

    Ok(EX_OK)
}

fn purge(store: &Store, address: &str) -> Result<Sysexit, Error> {
    with_mailbox_locked(store, address, |mailbox| {
        mailbox.purge()?;
        info!("Purged {}", mailbox);
        Ok(EX_OK)
    })
}

fn remove(store: &Store, address: &str, id: &str) -> Result<Sysexit, Error> {
    with_mailbox_locked(store, address, |mailbox| {
        let id = mailbox.message(id)?.id().to_owned();
        mailbox.remove(&id)?;
        info!("Removed {} from {}", id, mailbox);
        Ok(EX_OK)
    })
}

/// Run `f` on a fresh handle for the mailbox for `address` while holding
/// that mailbox's lock, so that it does not race with concurrent delivery.
fn with_mailbox_locked<R>(
    store: &Store,
    address: &str,
    f: impl FnOnce(&mut Mailbox) -> Result<R, Error>,
) -> Result<R, Error> {
    let lock = store.lock_for(address)?;
    let _lock = lock
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut mailbox = store.resolve(address)?;
    f(&mut mailbox)
}

fn print_line(
    out: &mut impl Write,
    line: std::fmt::Arguments<'_>,
) -> Result<(), Error> {
    writeln!(out, "{}", line).map_err(|source| Error::Io {
        path: "<stdout>".into(),
        source,
    })
}
