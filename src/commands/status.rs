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
use crate::ownership::{
    LockRecord, LockStatus, ManagedResource, RecordRead, read_record, to_chrono,
};
use chrono::Utc;
use colored::*;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ResourceStatus {
    resource: String,
    lock_path: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<LockRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    machine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_secs: Option<i64>,
    stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct StatusCommand<'a> {
    config: &'a SyncLockConfig,
}

impl<'a> StatusCommand<'a> {
    pub fn new(config: &'a SyncLockConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, dir: Option<&Path>, json: bool) -> Result<()> {
        let now = Utc::now();
        let stale_after = to_chrono(self.config.timing().stale_after);

        let statuses: Vec<ResourceStatus> = self
            .config
            .resource_paths(dir)?
            .into_iter()
            .map(ManagedResource::new)
            .map(|resource| {
                let mut status = ResourceStatus {
                    resource: resource.name(),
                    lock_path: resource.lock_path().display().to_string(),
                    state: "free",
                    record: None,
                    machine: None,
                    age_secs: None,
                    stale: false,
                    error: None,
                };
                match read_record(resource.lock_path()) {
                    RecordRead::Absent => {}
                    RecordRead::Present(record) => {
                        status.state = "held";
                        status.machine = Some(record.machine_name().to_string());
                        status.age_secs = Some(record.age(now).num_seconds());
                        status.stale = record.is_stale(now, stale_after);
                        status.record = Some(record);
                    }
                    RecordRead::Indeterminate(reason) => {
                        status.state = "unreadable";
                        status.error = Some(reason);
                    }
                }
                status
            })
            .collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            return Ok(());
        }

        for status in &statuses {
            print_status(status);
        }
        Ok(())
    }
}

fn print_status(status: &ResourceStatus) {
    print!("{} ", status.resource.bold());
    match (&status.record, &status.error) {
        (Some(record), _) => {
            let label = match record.status {
                LockStatus::Active => record.status.as_str().green(),
                LockStatus::Pending => record.status.as_str().yellow(),
                LockStatus::Released => record.status.as_str().cyan(),
            };
            print!(
                "{label} by {} ({}s ago)",
                record.identity,
                status.age_secs.unwrap_or_default()
            );
            if status.stale {
                print!(" {}", "stale".red());
            }
            println!();
        }
        (None, Some(error)) => println!("{} {error}", "unreadable".red()),
        (None, None) => println!("{}", "free".dimmed()),
    }
}
