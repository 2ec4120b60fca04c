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

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Why this process stopped being the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    /// A takeover request was honored.
    Yielded,
    /// Another identity's record was observed outside the grace window.
    Superseded,
}

/// Ownership transitions published by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipEvent {
    Acquired { identity: String },
    /// Emitted once per transition into losing ownership. The host must stop
    /// writing and show the store as locked by `holder`.
    Lost { holder: String, reason: LossReason },
}

/// Fan-out of ownership events to any number of subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<OwnershipEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<OwnershipEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(tx);
        rx
    }

    pub fn publish(&self, event: OwnershipEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
