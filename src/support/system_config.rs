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

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::support::error::Error;
use crate::support::file_ops::AtPath;

/// The system-wide configuration for Catchbox.
///
/// This is stored in a TOML file, typically `/etc/catchbox/catchbox.toml`.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct SystemConfig {
    /// Where and how mailbox indexes are stored.
    pub datastore: DataStoreConfig,

    /// How the command-line tool logs.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DataStoreConfig {
    /// The base path of the store. Mailboxes live under `mail/` inside it.
    #[serde(default)]
    pub path: PathBuf,

    /// The maximum number of messages a mailbox should hold, or 0 for no
    /// limit.
    ///
    /// The store itself does not enforce this. Whoever delivers mail is
    /// expected to consult it and make room before appending.
    #[serde(default = "default_mailbox_msg_cap")]
    pub mailbox_msg_cap: usize,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        DataStoreConfig {
            path: PathBuf::new(),
            mailbox_msg_cap: default_mailbox_msg_cap(),
        }
    }
}

fn default_mailbox_msg_cap() -> usize {
    500
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The maximum level logged to standard error when `config_file` is not
    /// set. One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,

    /// If non-empty, a log4rs configuration file to use instead of the
    /// built-in standard error logger.
    ///
    /// Relative paths are resolved against the directory containing the
    /// system configuration.
    pub config_file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_owned(),
            config_file: PathBuf::new(),
        }
    }
}

impl SystemConfig {
    /// Load the configuration from the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).at(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(Error::from)
    }
}

impl LoggingConfig {
    /// Parse `level` into a filter, or `None` if it is not a recognised
    /// level name.
    pub fn level_filter(&self) -> Option<log::LevelFilter> {
        self.level.parse().ok()
    }
}
