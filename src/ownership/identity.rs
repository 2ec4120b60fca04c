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

use crate::error::{Result, SyncLockError};
use crate::ownership::record::FIELD_SEPARATOR;
use log::debug;
use std::fmt;
use sysinfo::System;

/// Names one running process instance: `{machineName}:{processId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerIdentity {
    machine: String,
    pid: u32,
}

impl OwnerIdentity {
    pub fn new(machine: impl Into<String>, pid: u32) -> Result<Self> {
        let machine = machine.into();
        let trimmed = machine.trim();
        if trimmed.is_empty() || trimmed.contains(FIELD_SEPARATOR) {
            return Err(SyncLockError::InvalidIdentity(format!("{machine}:{pid}")));
        }
        Ok(Self {
            machine: trimmed.to_string(),
            pid,
        })
    }

    /// Identity of the calling process.
    pub fn current() -> Self {
        let machine = detect_machine_name();
        let pid = std::process::id();
        Self::new(machine, pid).unwrap_or_else(|_| Self {
            machine: "unknown".to_string(),
            pid,
        })
    }

    /// Parses `machine:pid`.
    pub fn parse(value: &str) -> Result<Self> {
        let (machine, pid) = value
            .rsplit_once(':')
            .ok_or_else(|| SyncLockError::InvalidIdentity(value.to_string()))?;
        let pid = pid
            .parse::<u32>()
            .map_err(|_| SyncLockError::InvalidIdentity(value.to_string()))?;
        Self::new(machine, pid)
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.machine, self.pid)
    }
}

fn detect_machine_name() -> String {
    if let Some(name) = System::host_name().filter(|name| !name.trim().is_empty()) {
        return name;
    }

    for var in ["COMPUTERNAME", "HOSTNAME"] {
        if let Ok(name) = std::env::var(var)
            && !name.trim().is_empty()
        {
            debug!("Host name unavailable, using ${var}");
            return name;
        }
    }

    "unknown".to_string()
}
