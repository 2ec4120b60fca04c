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

//! Acquiring the store: takeover requests, startup acquisition and release.

use crate::error::{Result, SyncLockError};
use crate::ownership::events::OwnershipEvent;
use crate::ownership::monitor::OwnershipMonitor;
use crate::ownership::record::{LockRecord, LockStatus, Ticks};
use crate::ownership::store::RecordRead;
use crate::ownership::timing::to_chrono;
use log::{debug, info, warn};
use serde::Serialize;

/// Answer to "has the owner let go yet?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TakeoverStatus {
    /// The primary record still names an owner.
    Pending,
    /// No lock file, an explicit RELEASED record, or an abandoned record.
    Released,
}

/// How a process came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Owner,
    /// Someone else holds the store. `holder` is `None` when the record could
    /// not be read.
    ReadOnly { holder: Option<String> },
}

impl OwnershipMonitor {
    /// Writes a PENDING record for this identity to every lock file.
    ///
    /// The heartbeat stops first so no tick can overwrite the request.
    pub fn request_takeover(&mut self) -> Result<()> {
        self.heartbeat.stop();
        self.takeover_in_progress = true;

        let pending = LockRecord::new(
            self.me.clone(),
            Ticks::from_datetime(self.clock.now()),
            LockStatus::Pending,
        );
        if let Err(err) = self.store.write_all(&pending) {
            self.takeover_in_progress = false;
            self.last_fault = Some(err.to_string());
            return Err(err);
        }
        info!("Requested takeover as {}", self.me);
        Ok(())
    }

    pub fn complete_takeover(&mut self) {
        self.takeover_in_progress = false;
    }

    /// `None` when the primary record cannot be read.
    pub fn check_takeover_status(&self) -> Option<TakeoverStatus> {
        match self.store.read_primary() {
            RecordRead::Absent => Some(TakeoverStatus::Released),
            RecordRead::Indeterminate(reason) => {
                debug!("Takeover status unknown: {reason}");
                None
            }
            RecordRead::Present(record) => {
                let abandoned =
                    record.is_stale(self.clock.now(), to_chrono(self.timing.stale_after));
                if record.status == LockStatus::Released || abandoned {
                    Some(TakeoverStatus::Released)
                } else {
                    Some(TakeoverStatus::Pending)
                }
            }
        }
    }

    /// Becomes the owner. Returns `false` on any failure instead of erroring.
    ///
    /// The grace window opens and both flags clear before any file is
    /// touched. With `reload`, connection handles are reopened once the
    /// ACTIVE records are written; a failed reopen is recorded but does not
    /// undo the acquisition.
    pub fn take_ownership(&mut self, reload: bool) -> bool {
        let now = self.clock.now();
        self.grace.begin(now);
        self.losing_ownership = false;
        self.takeover_in_progress = false;

        if let Err(err) = self.store.remove_all() {
            warn!("Cannot clear previous lock files: {err}");
            self.last_fault = Some(err.to_string());
            return false;
        }
        if let Err(err) = self.reassert(now) {
            warn!("Cannot write ownership records: {err}");
            self.last_fault = Some(err.to_string());
            return false;
        }
        self.heartbeat.start();

        if reload && let Err(err) = self.connections.reopen() {
            warn!("Acquired the store but could not reopen connections: {err}");
            self.last_fault = Some(err.to_string());
        }

        info!("Acquired ownership as {}", self.me);
        self.events.publish(OwnershipEvent::Acquired {
            identity: self.me.clone(),
        });
        true
    }

    /// Claims the store at process start unless another machine holds it.
    pub fn initialize(&mut self) -> Result<StartupOutcome> {
        let now = self.clock.now();
        let holder = match self.store.read_primary() {
            RecordRead::Absent => None,
            RecordRead::Present(record) if record.is_held_by(&self.me) => None,
            RecordRead::Present(record)
                if record.is_stale(now, to_chrono(self.timing.stale_after)) =>
            {
                debug!("Taking over abandoned record from {}", record.identity);
                None
            }
            RecordRead::Present(record) => Some(Some(record.identity)),
            RecordRead::Indeterminate(reason) => {
                warn!("Lock record unreadable at startup, staying read-only: {reason}");
                Some(None)
            }
        };

        match holder {
            None if self.take_ownership(false) => Ok(StartupOutcome::Owner),
            None => Err(SyncLockError::TakeoverFailed),
            Some(holder) => {
                self.losing_ownership = true;
                self.heartbeat.stop();
                info!(
                    "Store is held by {}, starting read-only",
                    holder.as_deref().unwrap_or("an unknown owner")
                );
                Ok(StartupOutcome::ReadOnly { holder })
            }
        }
    }

    /// Graceful shutdown: stops the heartbeat and deletes the lock files that
    /// still name this identity.
    pub fn remove_lock(&mut self) -> Result<usize> {
        self.heartbeat.stop();
        let removed = self.store.remove_owned_by(&self.me)?;
        if removed > 0 {
            info!("Released {removed} lock file(s) held by {}", self.me);
        }
        Ok(removed)
    }

    pub fn clear_lock_state(&mut self) {
        self.losing_ownership = false;
        self.takeover_in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::clock::Clock;
    use crate::ownership::monitor::TickOutcome;
    use crate::ownership::monitor::tests::Fixture;
    use chrono::Duration;
    use std::fs;

    #[test]
    fn request_writes_pending_everywhere_and_suspends_ticks() {
        let mut fx = Fixture::new();
        fx.monitor.heartbeat.start();

        fx.monitor.request_takeover().unwrap();

        assert!(!fx.monitor.heartbeat.is_running());
        for resource in fx.monitor.store.resources() {
            let text = fs::read_to_string(resource.lock_path()).unwrap();
            assert!(text.starts_with("PC1:100|"));
            assert!(text.ends_with("|PENDING"));
        }
        assert_eq!(fx.monitor.tick(true).unwrap(), TickOutcome::Suspended);

        fx.monitor.complete_takeover();
        assert!(!fx.monitor.takeover_in_progress);
    }

    #[test]
    fn takeover_status_follows_primary_record() {
        let fx = Fixture::new();
        assert_eq!(
            fx.monitor.check_takeover_status(),
            Some(TakeoverStatus::Released)
        );

        fx.write_primary("PC1:100", LockStatus::Active);
        assert_eq!(
            fx.monitor.check_takeover_status(),
            Some(TakeoverStatus::Pending)
        );

        fx.write_primary("PC2:200", LockStatus::Released);
        assert_eq!(
            fx.monitor.check_takeover_status(),
            Some(TakeoverStatus::Released)
        );

        fs::write(fx.monitor.store.primary().lock_path(), "").unwrap();
        assert_eq!(fx.monitor.check_takeover_status(), None);
    }

    #[test]
    fn silent_owner_is_eventually_released() {
        let fx = Fixture::new();
        fx.write_primary("PC1:100", LockStatus::Active);
        fx.clock.advance(Duration::seconds(121));
        assert_eq!(
            fx.monitor.check_takeover_status(),
            Some(TakeoverStatus::Released)
        );
    }

    #[test]
    fn take_ownership_resets_state_and_writes_active() {
        let mut fx = Fixture::new();
        fx.monitor.losing_ownership = true;
        fx.monitor.takeover_in_progress = true;
        fx.write_primary("PC2:200", LockStatus::Released);

        assert!(fx.monitor.take_ownership(true));

        let snapshot = fx.monitor.snapshot();
        assert!(!snapshot.losing_ownership);
        assert!(!snapshot.takeover_in_progress);
        assert!(snapshot.heartbeat_running);
        assert_eq!(
            snapshot.grace_ends_at,
            Some(fx.clock.now() + Duration::seconds(60))
        );
        for resource in fx.monitor.store.resources() {
            let text = fs::read_to_string(resource.lock_path()).unwrap();
            assert!(text.starts_with("PC1:100|"));
            assert!(text.ends_with("|ACTIVE"));
        }
        assert_eq!(
            fx.events.try_recv().unwrap(),
            OwnershipEvent::Acquired {
                identity: "PC1:100".to_string()
            }
        );
    }

    #[test]
    fn take_ownership_reports_failure_as_false() {
        let mut fx = Fixture::new();
        let lock_path = fx.monitor.store.primary().lock_path().to_path_buf();
        fs::create_dir(&lock_path).unwrap();

        assert!(!fx.monitor.take_ownership(false));
        assert!(!fx.monitor.heartbeat.is_running());
        assert!(fx.monitor.snapshot().last_fault.is_some());
    }

    #[test]
    fn startup_claims_free_store() {
        let mut fx = Fixture::new();
        assert_eq!(fx.monitor.initialize().unwrap(), StartupOutcome::Owner);
        assert!(fx.primary_text().ends_with("|ACTIVE"));
    }

    #[test]
    fn startup_respects_live_owner() {
        let mut fx = Fixture::new();
        fx.write_primary("PC2:200", LockStatus::Active);

        assert_eq!(
            fx.monitor.initialize().unwrap(),
            StartupOutcome::ReadOnly {
                holder: Some("PC2:200".to_string())
            }
        );
        assert!(fx.monitor.losing_ownership);
        assert!(fx.primary_text().starts_with("PC2:200|"));
        assert!(fx.events.try_recv().is_err());
    }

    #[test]
    fn startup_stays_read_only_over_garbage() {
        let mut fx = Fixture::new();
        fs::write(fx.monitor.store.primary().lock_path(), "???").unwrap();
        assert_eq!(
            fx.monitor.initialize().unwrap(),
            StartupOutcome::ReadOnly { holder: None }
        );
    }

    #[test]
    fn startup_claims_abandoned_store() {
        let mut fx = Fixture::new();
        fx.write_primary("PC2:200", LockStatus::Active);
        fx.clock.advance(Duration::minutes(10));
        assert_eq!(fx.monitor.initialize().unwrap(), StartupOutcome::Owner);
    }

    #[test]
    fn remove_lock_leaves_foreign_records() {
        let mut fx = Fixture::new();
        assert!(fx.monitor.take_ownership(false));
        fx.write_primary("PC2:200", LockStatus::Pending);

        assert_eq!(fx.monitor.remove_lock().unwrap(), 1);
        assert!(fx.primary_text().starts_with("PC2:200|"));
        assert!(!fx.monitor.heartbeat.is_running());
    }
}
