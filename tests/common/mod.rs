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

//! Two simulated machines sharing one synced folder.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use crossbeam::channel::Receiver;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use synclock::ownership::{
    Clock, Coordinator, LockFileStore, ManualClock, OwnerIdentity, OwnershipEvent,
    OwnershipTiming, Ticks,
};
use tempfile::TempDir;

/// Instant at which the reference record `PC1:100|638000000000000000|ACTIVE` is fresh.
pub const REFERENCE_TICKS: i64 = 638_000_000_000_000_000;

pub struct Machine {
    pub coordinator: Coordinator,
    pub events: Receiver<OwnershipEvent>,
}

impl Machine {
    pub fn losses(&self) -> Vec<OwnershipEvent> {
        self.events
            .try_iter()
            .filter(|event| matches!(event, OwnershipEvent::Lost { .. }))
            .collect()
    }
}

pub struct SharedFolder {
    pub temp: TempDir,
    pub clock: ManualClock,
}

impl SharedFolder {
    pub fn new() -> Self {
        let start = Ticks::new(REFERENCE_TICKS).to_datetime().unwrap();
        Self {
            temp: TempDir::new().unwrap(),
            clock: ManualClock::new(start),
        }
    }

    pub fn resources(&self) -> Vec<PathBuf> {
        vec![
            self.temp.path().join("catch_notes.db"),
            self.temp.path().join("history.db"),
        ]
    }

    /// A coordinator whose heartbeat never fires on its own; tests drive
    /// it with explicit ticks.
    pub fn machine(&self, name: &str, pid: u32) -> Machine {
        let store = LockFileStore::from_paths(self.resources()).unwrap();
        let coordinator = Coordinator::builder(store)
            .identity(OwnerIdentity::new(name, pid).unwrap())
            .clock(Arc::new(self.clock.clone()))
            .timing(OwnershipTiming {
                heartbeat_interval: std::time::Duration::from_secs(3600),
                ..OwnershipTiming::default()
            })
            .spawn()
            .unwrap();
        let events = coordinator.subscribe();
        Machine {
            coordinator,
            events,
        }
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }

    pub fn lock_path(&self, index: usize) -> PathBuf {
        let mut name = self.resources()[index].file_name().unwrap().to_os_string();
        name.push(".lock");
        self.temp.path().join(name)
    }

    pub fn read_lock(&self, index: usize) -> String {
        fs::read_to_string(self.lock_path(index)).unwrap()
    }

    pub fn write_lock(&self, index: usize, text: &str) {
        fs::write(self.lock_path(index), text).unwrap();
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `identity|<now>|status` stamped with the shared clock.
    pub fn record_now(&self, identity: &str, status: &str) -> String {
        let ticks = Ticks::from_datetime(self.now());
        format!("{identity}|{ticks}|{status}")
    }
}
