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

use crate::config::SyncLockConfig;
use crate::error::{Result, SyncLockError};
use crate::ownership::{
    CancellationToken, Coordinator, LockFileStore, OwnershipEvent, ResourceHandles,
    StartupOutcome, interrupt_token,
};
use colored::*;
use crossbeam::channel::RecvTimeoutError;
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const EVENT_POLL: Duration = Duration::from_millis(200);

/// Becomes the owner of the store and keeps the heartbeat alive until the
/// process is interrupted or ownership is lost.
pub struct HoldCommand<'a> {
    config: &'a SyncLockConfig,
}

impl<'a> HoldCommand<'a> {
    pub fn new(config: &'a SyncLockConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, dir: Option<&Path>, takeover: bool, timeout: Option<u64>) -> Result<()> {
        let paths = self.config.resource_paths(dir)?;
        let store = LockFileStore::from_paths(paths.clone())?;
        let primary_lock = store.primary().lock_path().display().to_string();
        let handles = Arc::new(ResourceHandles::new(paths));

        let coordinator = Coordinator::builder(store)
            .timing(self.config.timing())
            .connections(handles.clone())
            .spawn()?;
        let events = coordinator.subscribe();
        let cancellation = interrupt_token();

        match coordinator.initialize()? {
            StartupOutcome::Owner => {
                handles.open_all()?;
            }
            StartupOutcome::ReadOnly { holder } if takeover => {
                let timeout = timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.config.takeover_timeout());
                self.take_over(&coordinator, holder.as_deref(), timeout, &cancellation)?;
            }
            StartupOutcome::ReadOnly { holder: Some(holder) } => {
                return Err(SyncLockError::NotOwner { holder });
            }
            StartupOutcome::ReadOnly { holder: None } => {
                return Err(SyncLockError::LockIndeterminate { path: primary_lock });
            }
        }

        println!(
            "{} Holding the store as {} (Ctrl+C to release)",
            "✓".green().bold(),
            coordinator.identity()
        );

        while !cancellation.is_cancelled() {
            match events.recv_timeout(EVENT_POLL) {
                Ok(OwnershipEvent::Lost { holder, reason }) => {
                    eprintln!(
                        "{} Ownership lost to {holder} ({reason:?}), now read-only",
                        "!".yellow().bold()
                    );
                    coordinator.shutdown()?;
                    return Err(SyncLockError::NotOwner { holder });
                }
                Ok(OwnershipEvent::Acquired { .. }) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let removed = coordinator.shutdown()?;
        println!("{} Released {removed} lock file(s)", "✓".green().bold());
        Ok(())
    }

    fn take_over(
        &self,
        coordinator: &Coordinator,
        holder: Option<&str>,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        info!(
            "Requesting the store from {}",
            holder.unwrap_or("an unknown owner")
        );
        coordinator.request_takeover()?;
        println!("Waiting for {} to release the store...", holder.unwrap_or("the owner"));

        let waited = coordinator.wait_for_release(
            self.config.takeover_poll_interval(),
            timeout,
            cancellation,
        );
        if let Err(err) = waited {
            coordinator.complete_takeover()?;
            coordinator.remove_lock()?;
            return Err(err);
        }

        if !coordinator.take_ownership_and_reload() {
            return Err(SyncLockError::TakeoverFailed);
        }
        coordinator.complete_takeover()
    }
}
