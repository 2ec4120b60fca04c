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

//! Tolerant accessors for the lock files that sit next to each resource.
//!
//! The sync client may rewrite a lock file at any moment, so every handle is
//! opened with full sharing, lives for a single read or write, and is never
//! retried. Read failures are reported as [`RecordRead::Indeterminate`]
//! instead of errors.

use crate::error::{Result, SyncLockError};
use crate::ownership::record::{LockRecord, RecordDecodeError};
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to a resource path to form its lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

#[cfg(windows)]
const FILE_SHARE_ALL: u32 = 0x1 | 0x2 | 0x4; // READ | WRITE | DELETE

/// Result of reading a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRead {
    /// No lock file: nobody owns the resource.
    Absent,
    Present(LockRecord),
    /// The file could not be read or decoded. Not evidence either way.
    Indeterminate(String),
}

impl RecordRead {
    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            RecordRead::Present(record) => Some(record),
            _ => None,
        }
    }
}

impl From<RecordDecodeError> for RecordRead {
    fn from(err: RecordDecodeError) -> Self {
        RecordRead::Indeterminate(err.to_string())
    }
}

/// A file whose write ownership is coordinated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResource {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ManagedResource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// `<resource>.lock`, sibling to the resource file.
pub fn lock_path_for(resource: &Path) -> PathBuf {
    let mut file_name = resource
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(LOCK_SUFFIX);
    resource.with_file_name(file_name)
}

/// The ordered set of managed resources. The first one is the primary whose
/// record drives every decision; the others mirror it.
#[derive(Debug, Clone)]
pub struct LockFileStore {
    resources: Vec<ManagedResource>,
}

impl LockFileStore {
    pub fn new(resources: Vec<ManagedResource>) -> Result<Self> {
        if resources.is_empty() {
            return Err(SyncLockError::InvalidConfig(
                "at least one managed resource is required".to_string(),
            ));
        }
        Ok(Self { resources })
    }

    pub fn from_paths<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(paths.into_iter().map(ManagedResource::new).collect())
    }

    pub fn resources(&self) -> &[ManagedResource] {
        &self.resources
    }

    pub fn primary(&self) -> &ManagedResource {
        &self.resources[0]
    }

    pub fn read_primary(&self) -> RecordRead {
        read_record(self.primary().lock_path())
    }

    /// Writes `record` to every lock file, stopping at the first failure.
    pub fn write_all(&self, record: &LockRecord) -> Result<()> {
        for resource in &self.resources {
            write_record(resource.lock_path(), record)?;
        }
        Ok(())
    }

    /// Deletes every lock file regardless of its contents.
    pub fn remove_all(&self) -> Result<()> {
        for resource in &self.resources {
            remove_record(resource.lock_path())?;
        }
        Ok(())
    }

    /// Deletes only the lock files currently naming `identity`. Returns how many
    /// were removed; unreadable files are left alone.
    pub fn remove_owned_by(&self, identity: &str) -> Result<usize> {
        let mut removed = 0;
        for resource in &self.resources {
            match read_record(resource.lock_path()) {
                RecordRead::Present(record) if record.is_held_by(identity) => {
                    if remove_record(resource.lock_path())? {
                        removed += 1;
                    }
                }
                RecordRead::Present(record) => debug!(
                    "Leaving {} in place, it names {}",
                    resource.lock_path().display(),
                    record.identity
                ),
                RecordRead::Absent => {}
                RecordRead::Indeterminate(reason) => warn!(
                    "Leaving unreadable lock file {} in place: {reason}",
                    resource.lock_path().display()
                ),
            }
        }
        Ok(removed)
    }
}

/// Reads and decodes one lock file.
pub fn read_record(lock_path: &Path) -> RecordRead {
    let mut file = match open_shared(lock_path, false) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return RecordRead::Absent,
        Err(err) => {
            debug!("Cannot open {}: {err}", lock_path.display());
            return RecordRead::Indeterminate(err.to_string());
        }
    };

    let mut content = String::new();
    if let Err(err) = file.read_to_string(&mut content) {
        debug!("Cannot read {}: {err}", lock_path.display());
        return RecordRead::Indeterminate(err.to_string());
    }

    match LockRecord::decode(&content) {
        Ok(record) => RecordRead::Present(record),
        Err(err) => {
            debug!("Undecodable lock record in {}: {err}", lock_path.display());
            err.into()
        }
    }
}

/// Creates or overwrites one lock file and flushes it to disk.
pub fn write_record(lock_path: &Path, record: &LockRecord) -> Result<()> {
    let to_error = |err: io::Error| SyncLockError::LockWrite {
        path: lock_path.display().to_string(),
        details: err.to_string(),
    };

    let mut file = open_shared(lock_path, true).map_err(to_error)?;
    file.write_all(record.encode().as_bytes())
        .map_err(to_error)?;
    file.flush().map_err(to_error)?;
    file.sync_all().map_err(to_error)?;
    Ok(())
}

/// Deletes one lock file. A missing file is not an error; returns whether a
/// file was actually removed.
pub fn remove_record(lock_path: &Path) -> Result<bool> {
    match fs::remove_file(lock_path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SyncLockError::LockRemove {
            path: lock_path.display().to_string(),
            details: err.to_string(),
        }),
    }
}

/// Opens `path` with full sharing so the sync client can rewrite or delete it
/// while the handle is open.
pub(crate) fn open_shared(path: &Path, write: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    if write {
        options.write(true).create(true).truncate(true);
    } else {
        options.read(true);
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(FILE_SHARE_ALL);
    }

    options.open(path)
}
