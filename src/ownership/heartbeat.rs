// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crossbeam::channel::{self, Receiver};
use log::trace;
use std::time::{Duration, Instant};

/// The single periodic driver of the ownership monitor.
///
/// While running it owns one ticker channel; while stopped it hands out a
/// channel that never fires, so the coordinator loop can always select on
/// [`Heartbeat::ticks`].
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    ticker: Option<Receiver<Instant>>,
    starts: u64,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
            starts: 0,
        }
    }

    /// Starts the ticker. Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.ticker.is_some() {
            return false;
        }
        self.ticker = Some(channel::tick(self.interval));
        self.starts += 1;
        trace!("Heartbeat started ({:?} interval)", self.interval);
        true
    }

    /// Stops the ticker. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.ticker.take().is_some();
        if was_running {
            trace!("Heartbeat stopped");
        }
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Number of tickers created so far.
    pub fn starts(&self) -> u64 {
        self.starts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> Receiver<Instant> {
        self.ticker.clone().unwrap_or_else(channel::never)
    }
}
