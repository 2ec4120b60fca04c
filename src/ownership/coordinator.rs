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

//! The ownership coordinator: one actor thread per process.
//!
//! The thread owns the [`OwnershipMonitor`] and multiplexes two inputs with
//! `crossbeam::select!`: commands from [`Coordinator`] handles and the
//! heartbeat ticker. Every mutation therefore happens on that one thread and
//! the host never shares state with the timer.

use crate::error::{Result, SyncLockError};
use crate::ownership::cancellation::CancellationToken;
use crate::ownership::clock::{Clock, SystemClock};
use crate::ownership::connections::{ConnectionLifecycle, NoConnections};
use crate::ownership::events::{EventBus, OwnershipEvent};
use crate::ownership::identity::OwnerIdentity;
use crate::ownership::monitor::{OwnershipMonitor, OwnershipSnapshot, TickOutcome};
use crate::ownership::store::{LockFileStore, RecordRead};
use crate::ownership::takeover::{StartupOutcome, TakeoverStatus};
use crate::ownership::timing::OwnershipTiming;
use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, trace, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Command {
    Tick {
        respond: Sender<TickOutcome>,
    },
    ForceHeartbeat {
        respond: Sender<Result<TickOutcome>>,
    },
    Initialize {
        respond: Sender<Result<StartupOutcome>>,
    },
    RequestTakeover {
        respond: Sender<Result<()>>,
    },
    CompleteTakeover {
        respond: Sender<()>,
    },
    CheckTakeoverStatus {
        respond: Sender<Option<TakeoverStatus>>,
    },
    TakeOwnership {
        reload: bool,
        respond: Sender<bool>,
    },
    ClearLockState {
        respond: Sender<()>,
    },
    RemoveLock {
        respond: Sender<Result<usize>>,
    },
    StartHeartbeat {
        respond: Sender<bool>,
    },
    StopHeartbeat {
        respond: Sender<bool>,
    },
    CurrentHolder {
        respond: Sender<RecordRead>,
    },
    Snapshot {
        respond: Sender<OwnershipSnapshot>,
    },
    Shutdown,
}

pub struct CoordinatorBuilder {
    store: LockFileStore,
    identity: Option<OwnerIdentity>,
    clock: Arc<dyn Clock>,
    timing: OwnershipTiming,
    connections: Arc<dyn ConnectionLifecycle>,
}

impl CoordinatorBuilder {
    /// Overrides the `{machine}:{pid}` identity of this process.
    pub fn identity(mut self, identity: OwnerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timing(mut self, timing: OwnershipTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn connections(mut self, connections: Arc<dyn ConnectionLifecycle>) -> Self {
        self.connections = connections;
        self
    }

    /// Starts the actor thread. The heartbeat stays off until ownership is
    /// taken.
    pub fn spawn(self) -> Result<Coordinator> {
        let identity = self.identity.unwrap_or_else(OwnerIdentity::current);
        let events = EventBus::new();
        let monitor = OwnershipMonitor::new(
            identity.clone(),
            self.store,
            self.clock,
            self.timing,
            self.connections,
            events.clone(),
        );

        let (commands, inbox) = channel::unbounded();
        let worker = thread::Builder::new()
            .name(format!("synclock-{identity}"))
            .spawn(move || run(monitor, inbox))?;
        debug!("Ownership coordinator started for {identity}");

        Ok(Coordinator {
            identity,
            commands,
            events,
            worker: Some(worker),
        })
    }
}

/// Handle to the ownership actor of this process.
///
/// Dropping the handle removes this identity's lock files and joins the
/// actor; call [`Coordinator::shutdown`] to observe the result.
pub struct Coordinator {
    identity: OwnerIdentity,
    commands: Sender<Command>,
    events: EventBus,
    worker: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub fn builder(store: LockFileStore) -> CoordinatorBuilder {
        CoordinatorBuilder {
            store,
            identity: None,
            clock: Arc::new(SystemClock),
            timing: OwnershipTiming::default(),
            connections: Arc::new(NoConnections),
        }
    }

    pub fn identity(&self) -> &OwnerIdentity {
        &self.identity
    }

    /// Receives every ownership transition from now on.
    pub fn subscribe(&self) -> Receiver<OwnershipEvent> {
        self.events.subscribe()
    }

    /// Runs one tick immediately, outside the heartbeat schedule.
    pub fn tick(&self) -> Result<TickOutcome> {
        self.call(|respond| Command::Tick { respond })
    }

    /// Re-asserts now, bypassing the throttle. The grace window still applies.
    /// Write failures are returned instead of being absorbed.
    pub fn force_heartbeat(&self) -> Result<TickOutcome> {
        self.call(|respond| Command::ForceHeartbeat { respond })?
    }

    pub fn initialize(&self) -> Result<StartupOutcome> {
        self.call(|respond| Command::Initialize { respond })?
    }

    pub fn request_takeover(&self) -> Result<()> {
        self.call(|respond| Command::RequestTakeover { respond })?
    }

    pub fn complete_takeover(&self) -> Result<()> {
        self.call(|respond| Command::CompleteTakeover { respond })
    }

    pub fn check_takeover_status(&self) -> Option<TakeoverStatus> {
        self.call(|respond| Command::CheckTakeoverStatus { respond })
            .ok()
            .flatten()
    }

    pub fn take_ownership(&self) -> bool {
        self.call(|respond| Command::TakeOwnership {
            reload: false,
            respond,
        })
        .unwrap_or(false)
    }

    /// Like [`Coordinator::take_ownership`], then reopens connection handles.
    pub fn take_ownership_and_reload(&self) -> bool {
        self.call(|respond| Command::TakeOwnership {
            reload: true,
            respond,
        })
        .unwrap_or(false)
    }

    pub fn clear_lock_state(&self) -> Result<()> {
        self.call(|respond| Command::ClearLockState { respond })
    }

    /// Stops the heartbeat and deletes the lock files naming this identity.
    pub fn remove_lock(&self) -> Result<usize> {
        self.call(|respond| Command::RemoveLock { respond })?
    }

    pub fn start_heartbeat(&self) -> Result<bool> {
        self.call(|respond| Command::StartHeartbeat { respond })
    }

    pub fn stop_heartbeat(&self) -> Result<bool> {
        self.call(|respond| Command::StopHeartbeat { respond })
    }

    pub fn current_holder(&self) -> Result<RecordRead> {
        self.call(|respond| Command::CurrentHolder { respond })
    }

    pub fn snapshot(&self) -> Result<OwnershipSnapshot> {
        self.call(|respond| Command::Snapshot { respond })
    }

    /// Polls [`Coordinator::check_takeover_status`] until the owner lets go.
    pub fn wait_for_release(
        &self,
        poll_interval: Duration,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if cancellation.is_cancelled() {
                return Err(SyncLockError::TakeoverCancelled {
                    waited_secs: waited.as_secs_f64(),
                });
            }

            match self.call(|respond| Command::CheckTakeoverStatus { respond })? {
                Some(TakeoverStatus::Released) => {
                    debug!("Owner released the store after {waited:?}");
                    return Ok(());
                }
                Some(TakeoverStatus::Pending) => trace!("Still waiting for the owner"),
                None => trace!("Takeover status unknown, retrying"),
            }

            if waited >= timeout {
                let holder = self
                    .current_holder()
                    .ok()
                    .and_then(|read| read.record().map(|record| record.identity.clone()));
                return Err(SyncLockError::TakeoverTimedOut {
                    waited_secs: waited.as_secs_f64(),
                    holder,
                });
            }
            thread::sleep(poll_interval.min(timeout - waited));
        }
    }

    /// Removes this identity's lock files and stops the actor.
    pub fn shutdown(mut self) -> Result<usize> {
        self.stop()
    }

    fn stop(&mut self) -> Result<usize> {
        let Some(worker) = self.worker.take() else {
            return Ok(0);
        };
        let removed = self.remove_lock();
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            warn!("Ownership coordinator thread panicked");
        }
        removed
    }

    fn call<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (respond, response) = channel::bounded(1);
        self.commands
            .send(command(respond))
            .map_err(|_| SyncLockError::CoordinatorStopped)?;
        response
            .recv()
            .map_err(|_| SyncLockError::CoordinatorStopped)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("Failed to release lock files on shutdown: {err}");
        }
    }
}

fn run(mut monitor: OwnershipMonitor, inbox: Receiver<Command>) {
    loop {
        let ticks = monitor.heartbeat().ticks();
        crossbeam::select! {
            recv(inbox) -> message => match message {
                Ok(Command::Shutdown) | Err(_) => break,
                Ok(command) => handle(&mut monitor, command),
            },
            recv(ticks) -> _ => {
                if let Err(err) = monitor.tick(false) {
                    warn!("Heartbeat failed: {err}");
                    monitor.record_fault(err.to_string());
                }
            }
        }
    }
    monitor.heartbeat_mut().stop();
    debug!("Ownership coordinator for {} stopped", monitor.identity());
}

fn handle(monitor: &mut OwnershipMonitor, command: Command) {
    match command {
        Command::Tick { respond } => {
            let outcome = monitor.tick(false).unwrap_or_else(|err| {
                warn!("Tick failed: {err}");
                monitor.record_fault(err.to_string());
                TickOutcome::Faulted(err.to_string())
            });
            let _ = respond.send(outcome);
        }
        Command::ForceHeartbeat { respond } => {
            let _ = respond.send(monitor.tick(true));
        }
        Command::Initialize { respond } => {
            let _ = respond.send(monitor.initialize());
        }
        Command::RequestTakeover { respond } => {
            let _ = respond.send(monitor.request_takeover());
        }
        Command::CompleteTakeover { respond } => {
            monitor.complete_takeover();
            let _ = respond.send(());
        }
        Command::CheckTakeoverStatus { respond } => {
            let _ = respond.send(monitor.check_takeover_status());
        }
        Command::TakeOwnership { reload, respond } => {
            let _ = respond.send(monitor.take_ownership(reload));
        }
        Command::ClearLockState { respond } => {
            monitor.clear_lock_state();
            let _ = respond.send(());
        }
        Command::RemoveLock { respond } => {
            let _ = respond.send(monitor.remove_lock());
        }
        Command::StartHeartbeat { respond } => {
            let _ = respond.send(monitor.heartbeat_mut().start());
        }
        Command::StopHeartbeat { respond } => {
            let _ = respond.send(monitor.heartbeat_mut().stop());
        }
        Command::CurrentHolder { respond } => {
            let _ = respond.send(monitor.store().read_primary());
        }
        Command::Snapshot { respond } => {
            let _ = respond.send(monitor.snapshot());
        }
        Command::Shutdown => {}
    }
}
