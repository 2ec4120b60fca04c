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
use synclock::ownership::{
    LossReason, OwnershipEvent, StartupOutcome, TakeoverStatus, TickOutcome,
};

#[test]
fn test_takeover_end_to_end() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    let pc2 = folder.machine("PC2", 200);

    assert_eq!(pc1.coordinator.initialize().unwrap(), StartupOutcome::Owner);
    assert_eq!(folder.read_lock(0), "PC1:100|638000000000000000|ACTIVE");

    assert_eq!(
        pc2.coordinator.initialize().unwrap(),
        StartupOutcome::ReadOnly {
            holder: Some("PC1:100".to_string())
        }
    );

    folder.advance_secs(1);
    pc2.coordinator.request_takeover().unwrap();
    let pending = folder.read_lock(0);
    assert!(pending.starts_with("PC2:200|"));
    assert!(pending.ends_with("|PENDING"));
    assert_eq!(folder.read_lock(1), pending);
    assert_eq!(
        pc2.coordinator.check_takeover_status(),
        Some(TakeoverStatus::Pending)
    );

    folder.advance_secs(1);
    assert_eq!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Yielded {
            to: "PC2:200".to_string()
        }
    );
    for index in 0..2 {
        let released = folder.read_lock(index);
        assert!(released.starts_with("PC2:200|"));
        assert!(released.ends_with("|RELEASED"));
    }

    assert_eq!(
        pc2.coordinator.check_takeover_status(),
        Some(TakeoverStatus::Released)
    );
    folder.advance_secs(1);
    assert!(pc2.coordinator.take_ownership());
    pc2.coordinator.complete_takeover().unwrap();
    let active = folder.read_lock(0);
    assert!(active.starts_with("PC2:200|"));
    assert!(active.ends_with("|ACTIVE"));

    // The old owner stays quiet from now on.
    folder.advance_secs(10);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Suspended);
    assert_eq!(
        pc1.losses(),
        vec![OwnershipEvent::Lost {
            holder: "PC2:200".to_string(),
            reason: LossReason::Yielded,
        }]
    );
    assert!(pc2.losses().is_empty());
    assert!(folder.read_lock(0).starts_with("PC2:200|"));
}

#[test]
fn test_takeover_outside_grace_window() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    let pc2 = folder.machine("PC2", 200);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(90);
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Reasserted);

    pc2.coordinator.request_takeover().unwrap();
    folder.advance_secs(2);
    assert!(matches!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Yielded { .. }
    ));
    assert_eq!(pc1.losses().len(), 1);
    assert!(pc1.coordinator.snapshot().unwrap().losing_ownership);
    assert!(!pc1.coordinator.snapshot().unwrap().heartbeat_running);
}

#[test]
fn test_superseded_owner_goes_read_only_until_manual_takeover() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(61);
    folder.write_lock(0, &folder.record_now("PC2:200", "ACTIVE"));
    assert_eq!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Superseded {
            holder: "PC2:200".to_string()
        }
    );
    assert_eq!(pc1.coordinator.tick().unwrap(), TickOutcome::Suspended);
    assert_eq!(
        pc1.losses(),
        vec![OwnershipEvent::Lost {
            holder: "PC2:200".to_string(),
            reason: LossReason::Superseded,
        }]
    );

    // Manual reclaim by the user.
    pc1.coordinator.clear_lock_state().unwrap();
    assert!(pc1.coordinator.take_ownership_and_reload());
    assert!(folder.read_lock(0).starts_with("PC1:100|"));
    assert!(!pc1.coordinator.snapshot().unwrap().losing_ownership);
}

#[test]
fn test_foreign_release_outside_grace_is_a_loss() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    assert!(pc1.coordinator.take_ownership());

    folder.advance_secs(70);
    folder.write_lock(0, &folder.record_now("PC3:300", "RELEASED"));
    assert!(matches!(
        pc1.coordinator.tick().unwrap(),
        TickOutcome::Superseded { .. }
    ));
    assert!(folder.read_lock(0).starts_with("PC3:300|"));
}

#[test]
fn test_unanswered_request_can_be_abandoned() {
    let folder = SharedFolder::new();
    let pc1 = folder.machine("PC1", 100);
    let pc2 = folder.machine("PC2", 200);
    assert!(pc1.coordinator.take_ownership());

    pc2.coordinator.request_takeover().unwrap();
    pc2.coordinator.complete_takeover().unwrap();
    assert_eq!(pc2.coordinator.remove_lock().unwrap(), 2);

    assert!(!folder.lock_path(0).exists());
    assert_eq!(pc1.coordinator.force_heartbeat().unwrap(), TickOutcome::Reasserted);
    assert!(folder.read_lock(0).starts_with("PC1:100|"));
}
