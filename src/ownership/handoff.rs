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

//! Yielding the store to a machine that asked for it.

use crate::ownership::events::LossReason;
use crate::ownership::monitor::{OwnershipMonitor, TickOutcome};
use crate::ownership::record::{LockRecord, LockStatus, Ticks};
use crate::ownership::store::write_record;
use log::{info, warn};

impl OwnershipMonitor {
    /// Hands the store to `requester`.
    ///
    /// Connections are closed before the RELEASED records go out, so the
    /// requester never opens a file this process still writes to. Failures
    /// are logged and kept as the last fault; the loss is signalled anyway.
    pub(super) fn yield_to(&mut self, requester: &str) -> TickOutcome {
        info!("{requester} requested the store, handing it over");

        if let Err(err) = self.connections.close_all() {
            warn!("Failed to close connections before yielding: {err}");
            self.last_fault = Some(err.to_string());
        }

        let released = LockRecord::new(
            requester,
            Ticks::from_datetime(self.clock.now()),
            LockStatus::Released,
        );
        for resource in self.store.resources() {
            if let Err(err) = write_record(resource.lock_path(), &released) {
                warn!("{err}");
                self.last_fault = Some(err.to_string());
            }
        }

        self.mark_lost(requester, LossReason::Yielded);
        TickOutcome::Yielded {
            to: requester.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ownership::clock::Clock;
    use crate::error::{Result, SyncLockError};
    use crate::ownership::connections::ConnectionLifecycle;
    use crate::ownership::events::{LossReason, OwnershipEvent};
    use crate::ownership::monitor::TickOutcome;
    use crate::ownership::monitor::tests::Fixture;
    use crate::ownership::record::LockStatus;
    use chrono::Duration;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingConnections {
        closed: AtomicUsize,
        fail: bool,
    }

    impl ConnectionLifecycle for CountingConnections {
        fn close_all(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SyncLockError::ConnectionRelease("pool busy".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn pending_request_is_honored_outside_grace() {
        let mut fx = Fixture::new();
        let connections = Arc::new(CountingConnections::default());
        fx.monitor.connections = connections.clone();
        fx.write_primary("PC2:200", LockStatus::Pending);
        fx.clock.advance(Duration::seconds(1));

        assert_eq!(
            fx.monitor.tick(false).unwrap(),
            TickOutcome::Yielded {
                to: "PC2:200".to_string()
            }
        );
        assert_eq!(connections.closed.load(Ordering::SeqCst), 1);
        for resource in fx.monitor.store.resources() {
            let text = fs::read_to_string(resource.lock_path()).unwrap();
            assert!(text.starts_with("PC2:200|"));
            assert!(text.ends_with("|RELEASED"));
        }
        assert_eq!(
            fx.events.try_recv().unwrap(),
            OwnershipEvent::Lost {
                holder: "PC2:200".to_string(),
                reason: LossReason::Yielded,
            }
        );
        assert!(fx.events.try_recv().is_err());
    }

    #[test]
    fn pending_request_is_honored_inside_grace() {
        let mut fx = Fixture::new();
        let now = fx.clock.now();
        fx.monitor.grace.begin(now);
        fx.monitor.last_write = Some(now);
        fx.write_primary("PC2:200", LockStatus::Pending);

        assert!(matches!(
            fx.monitor.tick(false).unwrap(),
            TickOutcome::Yielded { .. }
        ));
        assert!(fx.monitor.losing_ownership);
    }

    #[test]
    fn stale_pending_request_is_ignored() {
        let mut fx = Fixture::new();
        fx.write_primary("PC2:200", LockStatus::Pending);
        fx.clock.advance(Duration::minutes(5));

        assert_eq!(fx.monitor.tick(false).unwrap(), TickOutcome::Reasserted);
        assert!(!fx.monitor.losing_ownership);
    }

    #[test]
    fn yield_survives_connection_failure() {
        let mut fx = Fixture::new();
        fx.monitor.connections = Arc::new(CountingConnections {
            closed: AtomicUsize::new(0),
            fail: true,
        });
        fx.write_primary("PC2:200", LockStatus::Pending);

        assert!(matches!(
            fx.monitor.tick(false).unwrap(),
            TickOutcome::Yielded { .. }
        ));
        assert!(fx.primary_text().ends_with("|RELEASED"));
        assert!(
            fx.monitor
                .snapshot()
                .last_fault
                .unwrap()
                .contains("pool busy")
        );
    }

    #[test]
    fn loss_is_signalled_once() {
        let mut fx = Fixture::new();
        fx.write_primary("PC2:200", LockStatus::Pending);
        fx.monitor.tick(false).unwrap();

        fx.write_primary("PC3:300", LockStatus::Pending);
        assert_eq!(fx.monitor.tick(false).unwrap(), TickOutcome::Suspended);
        assert_eq!(fx.events.try_iter().count(), 1);
    }
}
