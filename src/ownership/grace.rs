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

//! Post-acquisition window in which foreign ACTIVE records are ignored.
//!
//! Right after a takeover the previous owner's last heartbeats may still be
//! propagating through the sync client. Inside the window those ACTIVE
//! records are treated as sync lag. PENDING records are never suppressed.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct GracePeriod {
    window: Duration,
    started_at: Option<DateTime<Utc>>,
}

impl GracePeriod {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started_at: None,
        }
    }

    /// Starts a fresh window at `now`.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.map(|start| start + self.window)
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        match self.started_at {
            Some(start) => now.signed_duration_since(start) < self.window,
            None => false,
        }
    }
}
