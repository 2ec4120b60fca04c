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
use crate::ownership::store::open_shared;
use log::debug;
use std::fmt::Debug;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

/// Open/close lifecycle of the host's handles on the managed resources
/// (database connections, pools, file handles).
///
/// Implementations guard their own state; the coordinator calls them from
/// its loop while the host may call them from anywhere.
pub trait ConnectionLifecycle: Send + Sync + Debug {
    /// Closes every handle. Must not return before the files are free.
    fn close_all(&self) -> Result<()>;

    /// Reopens handles after this process became owner again.
    fn reopen(&self) -> Result<()> {
        Ok(())
    }
}

/// For hosts that open a fresh connection per operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConnections;

impl ConnectionLifecycle for NoConnections {
    fn close_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Long-lived read handles on the resource files themselves.
#[derive(Debug)]
pub struct ResourceHandles {
    paths: Vec<PathBuf>,
    open: Mutex<Vec<File>>,
}

impl ResourceHandles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            open: Mutex::new(Vec::new()),
        }
    }

    /// Opens a handle on every resource that exists. Already-open handles are
    /// replaced.
    pub fn open_all(&self) -> Result<usize> {
        let mut open = self.open.lock().unwrap_or_else(|poison| poison.into_inner());
        open.clear();
        for path in &self.paths {
            if !path.exists() {
                continue;
            }
            let file = open_shared(path, false).map_err(|err| {
                SyncLockError::ConnectionReopen(format!("{}: {err}", path.display()))
            })?;
            open.push(file);
        }
        debug!("Opened {} resource handle(s)", open.len());
        Ok(open.len())
    }

    pub fn open_count(&self) -> usize {
        self.open
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }
}

impl ConnectionLifecycle for ResourceHandles {
    fn close_all(&self) -> Result<()> {
        let mut open = self.open.lock().unwrap_or_else(|poison| poison.into_inner());
        let closed = open.len();
        open.clear();
        debug!("Closed {closed} resource handle(s)");
        Ok(())
    }

    fn reopen(&self) -> Result<()> {
        self.open_all().map(|_| ())
    }
}
