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

//! Generation of message identifiers.
//!
//! An identifier is the delivery time to the second followed by a four-digit
//! counter, e.g. `20230105T134502-0042`. The counter comes from a background
//! thread which feeds the cyclic sequence 0000..9999 into a small bounded
//! queue. Every caller draining that queue gets a distinct value, so two IDs
//! generated in the same second only collide if 10000 other IDs were handed
//! out in between. Nothing here survives a restart, so uniqueness across
//! processes is only as good as the timestamp.

use std::thread;

use chrono::prelude::*;
use crossbeam::channel::{self, Receiver, Sender};
use log::error;

use crate::support::error::Error;

/// The counter wraps back to 0 upon reaching this value.
const COUNTER_CYCLE: u16 = 10_000;
/// How far the producer may run ahead of consumers.
const QUEUE_DEPTH: usize = 10;

pub struct IdGenerator {
    counts: Option<Receiver<u16>>,
    producer: Option<thread::JoinHandle<()>>,
}

impl IdGenerator {
    /// Start the producer thread.
    ///
    /// It runs until the generator is stopped or dropped.
    pub fn start() -> Self {
        let (tx, rx) = channel::bounded(QUEUE_DEPTH);
        let producer = thread::spawn(move || produce(tx));
        IdGenerator {
            counts: Some(rx),
            producer: Some(producer),
        }
    }

    /// Generate a new message identifier for a message received at `date`.
    ///
    /// Blocks if the producer has momentarily fallen behind.
    pub fn generate_id(&self, date: DateTime<Utc>) -> Result<String, Error> {
        let count = self
            .counts
            .as_ref()
            .and_then(|c| c.recv().ok())
            .ok_or(Error::IdGeneratorStopped)?;
        Ok(format!("{}-{:04}", generate_prefix(date), count))
    }

    /// Stop the producer thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the queue makes the producer's next send fail
        drop(self.counts.take());
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                error!("Message ID producer thread panicked");
            }
        }
    }
}

impl Drop for IdGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn produce(tx: Sender<u16>) {
    for count in (0..COUNTER_CYCLE).cycle() {
        if tx.send(count).is_err() {
            break;
        }
    }
}

/// Format `date` as the `YYYYMMDDThhmmss` prefix of a message identifier.
pub fn generate_prefix(date: DateTime<Utc>) -> String {
    date.format("%Y%m%dT%H%M%S").to_string()
}
