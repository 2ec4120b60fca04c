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

use std::time::Duration;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_REASSERT_INTERVAL: Duration = Duration::from_millis(3500);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(120);

/// Protocol timings. Every machine sharing a folder should use the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipTiming {
    /// Period of the heartbeat driver.
    pub heartbeat_interval: Duration,
    /// Minimum time between two ACTIVE re-assertions.
    pub reassert_interval: Duration,
    /// Window after acquisition in which foreign ACTIVE records are ignored.
    pub grace_period: Duration,
    /// Age beyond which any record is treated as abandoned.
    pub stale_after: Duration,
}

impl Default for OwnershipTiming {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reassert_interval: DEFAULT_REASSERT_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

/// Converts to a chrono duration, saturating at a century.
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
