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

//! Mapping from email addresses to mailbox names and on-disk shard paths.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tiny_keccak::{Hasher, Sha3};

use crate::support::error::Error;

/// Characters other than ASCII alphanumerics permitted in a mailbox name.
///
/// This is the RFC 5322 `atext` set plus `.`.
const EXTRA_NAME_CHARS: &str = "!#$%&'*+-/=?^_`{|}~.";

/// Normalise the given email address (or bare local part) into a mailbox
/// name.
///
/// The result is lower case, has the domain and any `+tag` suffix removed,
/// and contains only characters allowed in an unquoted local part.
pub fn parse_mailbox_name(address: &str) -> Result<String, Error> {
    if address.is_empty() {
        return Err(Error::InvalidAddress(
            "mailbox name cannot be empty".to_owned(),
        ));
    }

    let lower = address.to_lowercase();
    let local = match lower.find('@') {
        Some(at) => &lower[..at],
        None => &lower[..],
    };
    let local = match local.find('+') {
        Some(plus) => &local[..plus],
        None => local,
    };

    if local.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "no local part in {:?}",
            address
        )));
    }

    let invalid: String = local
        .chars()
        .filter(|&c| {
            !c.is_ascii_alphanumeric() && !EXTRA_NAME_CHARS.contains(c)
        })
        .collect();
    if !invalid.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "mailbox name contained invalid character(s): {:?}",
            invalid
        )));
    }

    Ok(local.to_owned())
}

/// Hash a normalised mailbox name into the fixed-width (64 hex digit) string
/// that names its directory.
///
/// This is not used for anything security-sensitive; it only needs to
/// spread names evenly over the shard directories.
pub fn hash_mailbox_name(name: &str) -> String {
    let mut sha3 = Sha3::v256();
    sha3.update(name.as_bytes());
    let mut hash = [0u8; 32];
    sha3.finalize(&mut hash);

    let mut hex = String::with_capacity(2 * hash.len());
    for &b in &hash {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

/// Return the directory for the mailbox whose hash is `hash`, within the mail
/// root `mail_path`.
///
/// The layout is `<mail_path>/<hash[0:3]>/<hash[0:6]>/<hash>`, which keeps
/// each level to at most 4096 entries.
pub fn shard_path(mail_path: &Path, hash: &str) -> PathBuf {
    mail_path.join(&hash[0..3]).join(&hash[0..6]).join(hash)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_valid_addresses() {
        assert_eq!("bob", parse_mailbox_name("bob@example.com").unwrap());
        assert_eq!("bob", parse_mailbox_name("Bob@Example.COM").unwrap());
        assert_eq!("bob", parse_mailbox_name("BOB").unwrap());
        assert_eq!("bob", parse_mailbox_name("bob+spam@example.com").unwrap());
        assert_eq!(
            "first.last",
            parse_mailbox_name("First.Last@example.com").unwrap()
        );
        assert_eq!(
            "o'neil_{x}",
            parse_mailbox_name("O'Neil_{x}").unwrap()
        );
    }

    #[test]
    fn parse_invalid_addresses() {
        assert_matches!(Err(Error::InvalidAddress(..)), parse_mailbox_name(""));
        assert_matches!(
            Err(Error::InvalidAddress(..)),
            parse_mailbox_name("@example.com")
        );
        assert_matches!(
            Err(Error::InvalidAddress(..)),
            parse_mailbox_name("+tag@example.com")
        );
        assert_matches!(
            Err(Error::InvalidAddress(..)),
            parse_mailbox_name("bo b@example.com")
        );
        assert_matches!(
            Err(Error::InvalidAddress(..)),
            parse_mailbox_name("bob\"@example.com")
        );
        assert_matches!(
            Err(Error::InvalidAddress(..)),
            parse_mailbox_name("böb")
        );
    }

    #[test]
    fn hash_is_fixed_width_lower_hex() {
        for name in &["a", "bob", "some.rather.long.mailbox.name"] {
            let hash = hash_mailbox_name(name);
            assert_eq!(64, hash.len());
            assert!(hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        assert_ne!(hash_mailbox_name("bob"), hash_mailbox_name("alice"));
    }

    #[test]
    fn shard_path_layout() {
        let hash = hash_mailbox_name("bob");
        let path = shard_path(Path::new("/base/mail"), &hash);
        assert_eq!(
            Path::new("/base/mail")
                .join(&hash[..3])
                .join(&hash[..6])
                .join(&hash),
            path
        );
    }

    proptest! {
        #[test]
        fn shard_path_is_deterministic(
            name in "[a-z0-9][a-z0-9._-]{0,30}"
        ) {
            let normalised = parse_mailbox_name(&name).unwrap();
            let a = shard_path(
                Path::new("/m"), &hash_mailbox_name(&normalised));
            let b = shard_path(
                Path::new("/m"),
                &hash_mailbox_name(
                    &parse_mailbox_name(
                        &format!("{}@Example.org", name.to_uppercase()))
                        .unwrap()));
            prop_assert_eq!(a, b);
        }
    }
}
