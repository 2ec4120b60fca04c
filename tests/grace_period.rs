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

mod common;

use common::SharedFolder;
use std::fs;
use synclock::error::SyncLockError;
use synclock::ownership::{OwnershipEvent, StartupOutcome, TakeoverStatus, TickOutcome};

#[test]
fn test_foreign_active_ignored_inside_grace() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(1);
    folder.write_lock(0, &folder.record_now("PC2:200", "ACTIVE"));
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Idle);

    folder.advance_secs(3);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);
    assert!(folder.read_lock(0).starts_with("PC1:100|"));
    assert!(pc1.losses().is_empty());
}

#[test]
fn test_forced_heartbeat_inside_grace_reasserts() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(1);
    folder.write_lock(0, &folder.record_now("PC2:200", "ACTIVE"));
    assert_eq!(
        pc1.coordinator.force_heartbeat().unwrap(),
        TickOutcome::Reasserted
    );
    assert!(folder.read_lock(0).starts_with("PC1:100|"));
    assert!(pc1.losses().is_empty());
}

#[test]
fn test_out_of_range_timestamp_keeps_actor_alive() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(90);
    folder.write_lock(0, &format!("PC2:200|{}|ACTIVE", i64::MIN));
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);
    assert!(pc1.coordinator.snapshot().is_ok());
    assert!(pc1.losses().is_empty());
}

#[test]
fn test_foreign_pending_honored_inside_grace() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(5);
    folder.write_lock(0, &folder.record_now("PC2:200", "PENDING"));
    assert_eq!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Yielded {
            to: "PC2:200".to_string()
        }
    );
    assert_eq!(pc1.losses().len(), 1);
}

#[test]
fn test_grace_window_closes_after_sixty_seconds() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    let grace_ends = pc1.coordinator.snapshot().unwrap().grace_ends_at.unwrap();
    folder.advance_secs(60);
    folder.write_lock(0, &folder.record_now("PC2:200", "ACTIVE"));

    assert!(matches!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Superseded { .. }
    ));
    assert!(grace_ends <= folder.now());
}

#[test]
fn test_stale_records_are_abandoned() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    let pc2 = folder.machine("PC2", 200);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(65);
    folder.write_lock(0, &folder.record_now("PC2:200", "PENDING"));
    folder.advance_secs(121);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);
    assert!(pc1.losses().is_empty());

    // An owner that stops heart-beating is eventually presumed gone.
    pc1.coordinator.stop_heartbeat().unwrap();
    folder.advance_secs(121);
    assert_eq!(
        pc2.coordinator.check_takeover_status(),
        Some(TakeoverStatus::Released)
    );
    assert_eq!(pc2.coordinator.initialize().unwrap(), StartupOutcome::Owner);
}

#[test]
fn test_future_dated_record_is_not_stale() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);

    folder.advance_secs(600);
    folder.write_lock(0, &folder.record_now("PC2:200", "ACTIVE"));
    folder.advance_secs(-600);

    assert_eq!(
        pc1.coordinator.initialize().unwrap(),
        StartupOutcome::ReadOnly {
            holder: Some("PC2:200".to_string())
        }
    );
}

#[test]
fn test_unreadable_record_is_not_evidence() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(90);
    fs::write(folder.lock_path(0), "PC2:200|not-a-number|ACTIVE").unwrap();
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);
    assert!(pc1.losses().is_empty());
    assert_eq!(
        pc1.coordinator.check_takeover_status(),
        Some(TakeoverStatus::Pending)
    );

    fs::write(folder.lock_path(0), "").unwrap();
    assert_eq!(pc1.coordinator.check_takeover_status(), None);
}

#[test]
fn test_heartbeat_start_is_idempotent() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    assert!(!pc1.coordinator.start_heartbeat().unwrap());
    assert!(!pc1.coordinator.start_heartbeat().unwrap());
    let snapshot = pc1.coordinator.snapshot().unwrap();
    assert!(snapshot.heartbeat_running);
    assert_eq!(snapshot.heartbeat_starts, 1);

    // Within one re-assertion period only the first tick writes.
    folder.advance_secs(61);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Idle);
}

#[test]
fn test_remove_lock_only_touches_own_records() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());
    folder.write_lock(1, &folder.record_now("PC2:200", "PENDING"));

    assert_eq!(pc1.coordinator.remove_lock().unwrap(), 1);
    assert!(!folder.lock_path(0).exists());
    assert!(folder.read_lock(1).starts_with("PC2:200|"));
    assert!(!pc1.coordinator.snapshot().unwrap().heartbeat_running);
}

#[test]
fn test_forced_heartbeat_reports_write_failure() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    fs::remove_file(folder.lock_path(1)).unwrap();
    fs::create_dir(folder.lock_path(1)).unwrap();

    let err = pc1.coordinator.force_heartbeat().unwrap_err();
    assert!(matches!(err, SyncLockError::LockWrite { .. }));

    // Unforced ticks absorb the same failure.
    folder.advance_secs(4);
    assert!(matches!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Faulted(_)
    ));
    assert!(pc1.coordinator.snapshot().unwrap().last_fault.is_some());
}

#[test]
fn test_shutdown_releases_locks_and_closes_event_stream() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());
    let events = pc1.events;

    assert_eq!(pc1.coordinator.shutdown().unwrap(), 2);
    assert!(!folder.lock_path(0).exists());
    assert!(!folder.lock_path(1).exists());
    assert_eq!(
        events.recv().unwrap(),
        OwnershipEvent::Acquired {
            identity: "PC1:100".to_string()
        }
    );
    assert!(events.recv().is_err());
}
