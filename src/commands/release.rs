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
use crate::error::Result;
use crate::ownership::{ManagedResource, OwnerIdentity, RecordRead, read_record, remove_record};
use colored::*;
use log::{debug, warn};
use std::path::Path;

/// Manual recovery after a crash: deletes lock files left by a dead process.
pub struct ReleaseCommand<'a> {
    config: &'a SyncLockConfig,
}

impl<'a> ReleaseCommand<'a> {
    pub fn new(config: &'a SyncLockConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Removes lock files naming `identity`, or any identity of this machine
    /// when none is given.
    pub fn execute(&self, dir: Option<&Path>, identity: Option<&str>) -> Result<()> {
        if let Some(identity) = identity {
            OwnerIdentity::parse(identity)?;
        }
        let machine = OwnerIdentity::current().machine().to_string();

        let mut removed = 0;
        for resource in self
            .config
            .resource_paths(dir)?
            .into_iter()
            .map(ManagedResource::new)
        {
            let record = match read_record(resource.lock_path()) {
                RecordRead::Present(record) => record,
                RecordRead::Absent => continue,
                RecordRead::Indeterminate(reason) => {
                    warn!(
                        "Skipping unreadable {}: {reason}",
                        resource.lock_path().display()
                    );
                    continue;
                }
            };

            let matches = match identity {
                Some(identity) => record.is_held_by(identity),
                None => record.machine_name() == machine,
            };
            if !matches {
                debug!("{} names {}, leaving it", resource.name(), record.identity);
                continue;
            }

            if remove_record(resource.lock_path())? {
                println!(
                    "{} Removed {} lock held by {}",
                    "✓".green().bold(),
                    resource.name(),
                    record.identity
                );
                removed += 1;
            }
        }

        if removed == 0 {
            println!("No matching lock files found");
        }
        Ok(())
    }
}
