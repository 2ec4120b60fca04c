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

//! Per-tick ownership state machine.
//!
//! [`OwnershipMonitor`] owns every piece of mutable ownership state. It is
//! driven exclusively by the coordinator loop, so none of its methods need
//! interior locking. The yield and takeover procedures live in the sibling
//! `handoff` and `takeover` modules as further `impl` blocks.

use crate::error::Result;
use crate::ownership::clock::Clock;
use crate::ownership::connections::ConnectionLifecycle;
use crate::ownership::events::{EventBus, LossReason, OwnershipEvent};
use crate::ownership::grace::GracePeriod;
use crate::ownership::heartbeat::Heartbeat;
use crate::ownership::identity::OwnerIdentity;
use crate::ownership::record::{LockRecord, LockStatus, Ticks};
use crate::ownership::store::{LockFileStore, RecordRead};
use crate::ownership::timing::{OwnershipTiming, to_chrono};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ownership was lost or a takeover request is in flight; nothing checked.
    Suspended,
    /// Nothing to do yet.
    Idle,
    /// Fresh ACTIVE records were written.
    Reasserted,
    /// A takeover request was honored.
    Yielded { to: String },
    /// Another identity's record was observed outside the grace window.
    Superseded { holder: String },
    /// The tick failed; the heartbeat keeps running.
    Faulted(String),
}

/// Point-in-time view of the in-memory ownership state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipSnapshot {
    pub identity: String,
    pub losing_ownership: bool,
    pub takeover_in_progress: bool,
    pub grace_started_at: Option<DateTime<Utc>>,
    pub grace_ends_at: Option<DateTime<Utc>>,
    pub heartbeat_running: bool,
    pub heartbeat_interval_ms: u64,
    /// How many heartbeat timers have been created over the process lifetime.
    pub heartbeat_starts: u64,
    pub last_write: Option<DateTime<Utc>>,
    pub last_fault: Option<String>,
}

#[derive(Debug)]
pub struct OwnershipMonitor {
    pub(super) identity: OwnerIdentity,
    pub(super) me: String,
    pub(super) store: LockFileStore,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) timing: OwnershipTiming,
    pub(super) grace: GracePeriod,
    pub(super) heartbeat: Heartbeat,
    pub(super) connections: Arc<dyn ConnectionLifecycle>,
    pub(super) events: EventBus,
    pub(super) losing_ownership: bool,
    pub(super) takeover_in_progress: bool,
    pub(super) last_write: Option<DateTime<Utc>>,
    pub(super) last_fault: Option<String>,
}

impl OwnershipMonitor {
    pub fn new(
        identity: OwnerIdentity,
        store: LockFileStore,
        clock: Arc<dyn Clock>,
        timing: OwnershipTiming,
        connections: Arc<dyn ConnectionLifecycle>,
        events: EventBus,
    ) -> Self {
        Self {
            me: identity.to_string(),
            identity,
            store,
            clock,
            grace: GracePeriod::new(to_chrono(timing.grace_period)),
            heartbeat: Heartbeat::new(timing.heartbeat_interval),
            timing,
            connections,
            events,
            losing_ownership: false,
            takeover_in_progress: false,
            last_write: None,
            last_fault: None,
        }
    }

    pub fn identity(&self) -> &OwnerIdentity {
        &self.identity
    }

    pub fn store(&self) -> &LockFileStore {
        &self.store
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn heartbeat_mut(&mut self) -> &mut Heartbeat {
        &mut self.heartbeat
    }

    /// Runs one evaluation of the ownership rules.
    ///
    /// `force` skips only the re-assertion throttle. Inside the grace window a
    /// foreign ACTIVE record is never read as a loss, forced or not. Only the final ACTIVE write can fail; every observation problem is
    /// absorbed and retried on the next tick.
    pub fn tick(&mut self, force: bool) -> Result<TickOutcome> {
        if self.losing_ownership || self.takeover_in_progress {
            return Ok(TickOutcome::Suspended);
        }

        let now = self.clock.now();

        if self.grace.contains(now) {
            if let Some(requester) = self.foreign_pending(now) {
                return Ok(self.yield_to(&requester));
            }
            if force || self.reassert_due(now) {
                self.reassert(now)?;
                return Ok(TickOutcome::Reasserted);
            }
            return Ok(TickOutcome::Idle);
        }

        match self.store.read_primary() {
            RecordRead::Present(record) if !record.is_held_by(&self.me) => {
                if record.is_stale(now, to_chrono(self.timing.stale_after)) {
                    debug!(
                        "Ignoring abandoned {} record from {} ({}s old)",
                        record.status,
                        record.identity,
                        record.age(now).num_seconds()
                    );
                } else {
                    match record.status {
                        LockStatus::Pending => return Ok(self.yield_to(&record.identity)),
                        LockStatus::Active | LockStatus::Released => {
                            return Ok(self.supersede(&record.identity));
                        }
                    }
                }
            }
            RecordRead::Present(_) => {
                if self.losing_ownership {
                    info!("Own lock record observed again, clearing ownership loss");
                    self.losing_ownership = false;
                }
            }
            RecordRead::Absent => debug!("Primary lock file is missing, re-asserting"),
            RecordRead::Indeterminate(reason) => {
                debug!("Primary lock record unreadable this tick: {reason}")
            }
        }

        if force || self.reassert_due(now) {
            if let Some(requester) = self.foreign_pending(now) {
                return Ok(self.yield_to(&requester));
            }
            self.reassert(now)?;
            return Ok(TickOutcome::Reasserted);
        }

        Ok(TickOutcome::Idle)
    }

    pub fn snapshot(&self) -> OwnershipSnapshot {
        OwnershipSnapshot {
            identity: self.me.clone(),
            losing_ownership: self.losing_ownership,
            takeover_in_progress: self.takeover_in_progress,
            grace_started_at: self.grace.started_at(),
            grace_ends_at: self.grace.ends_at(),
            heartbeat_running: self.heartbeat.is_running(),
            heartbeat_interval_ms: u64::try_from(self.heartbeat.interval().as_millis())
                .unwrap_or(u64::MAX),
            heartbeat_starts: self.heartbeat.starts(),
            last_write: self.last_write,
            last_fault: self.last_fault.clone(),
        }
    }

    pub fn record_fault(&mut self, fault: String) {
        self.last_fault = Some(fault);
    }

    /// Identity of a fresh PENDING record from someone else, if the primary
    /// holds one.
    pub(super) fn foreign_pending(&self, now: DateTime<Utc>) -> Option<String> {
        let read = self.store.read_primary();
        let record = read.record()?;
        let requested = record.status == LockStatus::Pending
            && !record.is_held_by(&self.me)
            && !record.is_stale(now, to_chrono(self.timing.stale_after));
        requested.then(|| record.identity.clone())
    }

    fn reassert_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_write {
            Some(last) => now.signed_duration_since(last) >= to_chrono(self.timing.reassert_interval),
            None => true,
        }
    }

    /// Writes a fresh ACTIVE record for every managed resource.
    pub(super) fn reassert(&mut self, now: DateTime<Utc>) -> Result<()> {
        let record = LockRecord::new(self.me.clone(), Ticks::from_datetime(now), LockStatus::Active);
        self.store.write_all(&record)?;
        self.last_write = Some(now);
        debug!("Re-asserted ownership as {}", self.me);
        Ok(())
    }

    fn supersede(&mut self, holder: &str) -> TickOutcome {
        self.mark_lost(holder, LossReason::Superseded);
        TickOutcome::Superseded {
            holder: holder.to_string(),
        }
    }

    /// Enters the losing-ownership state. The event fires only on the
    /// transition, never twice for the same loss.
    pub(super) fn mark_lost(&mut self, holder: &str, reason: LossReason) {
        let transition = !self.losing_ownership;
        self.losing_ownership = true;
        self.heartbeat.stop();
        if transition {
            info!("Ownership lost to {holder} ({reason:?})");
            self.events.publish(OwnershipEvent::Lost {
                holder: holder.to_string(),
                reason,
            });
        }
    }
}
