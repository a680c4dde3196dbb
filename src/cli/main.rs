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

use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::{LoggingConfig, SystemConfig};

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// The configuration file
    /// [default: /etc/catchbox/catchbox.toml or
    /// /usr/local/etc/catchbox/catchbox.toml]
    #[structopt(long, short, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
pub(super) enum Command {
    /// List every mailbox in the store, with its message count.
    ///
    /// Mailboxes are identified by the hash of their name, since the store
    /// does not record the original address.
    List,
    /// Show the messages in the mailbox for an address.
    Show {
        /// The address (or bare mailbox name) to look up.
        address: String,
    },
    /// Delete every message in the mailbox for an address.
    Purge {
        /// The address (or bare mailbox name) to purge.
        address: String,
    },
    /// Delete one message from the mailbox for an address.
    Remove {
        /// The address (or bare mailbox name) holding the message.
        address: String,
        /// The message identifier, or "latest".
        id: String,
    },
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options = Options::from_clap(&match Options::clap()
        .get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    let config_path = options.config.unwrap_or_else(|| {
        let candidates = [
            Path::new("/etc/catchbox/catchbox.toml"),
            Path::new("/usr/local/etc/catchbox/catchbox.toml"),
        ];
        match candidates.iter().find(|p| p.is_file()) {
            Some(p) => p.to_path_buf(),
            None => {
                eprintln!(
                    "Neither /etc/catchbox/catchbox.toml nor\n\
                     /usr/local/etc/catchbox/catchbox.toml exists; use\n\
                     --config=/path/to/catchbox.toml if your configuration\n\
                     is elsewhere."
                );
                EX_CONFIG.exit()
            }
        }
    });

    let system_config = match SystemConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                config_path.display(),
                e
            );
            EX_CONFIG.exit()
        }
    };

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    init_logging(&system_config.logging, config_dir);

    let exit = super::admin::run(&system_config, options.command);
    if EX_OK != exit {
        exit.exit();
    }
}

fn init_logging(config: &LoggingConfig, config_dir: &Path) {
    if !config.config_file.as_os_str().is_empty() {
        let path = config_dir.join(&config.config_file);
        if let Err(e) = log4rs::init_file(&path, Default::default()) {
            eprintln!(
                "Failed to initialise logging from '{}': {}",
                path.display(),
                e
            );
            EX_CONFIG.exit();
        }
        return;
    }

    let level = match config.level_filter() {
        Some(level) => level,
        None => {
            eprintln!("Unknown log level '{}'", config.level);
            EX_CONFIG.exit()
        }
    };

    if let Err(e) = init_simple_log(level) {
        eprintln!("Failed to initialise logging: {}", e);
        EX_SOFTWARE.exit();
    }
}

/// Log everything at or above `level` to standard error.
pub fn init_simple_log(
    level: log::LevelFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%dT%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
