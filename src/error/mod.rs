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

mod context;
mod exit_codes;
mod format;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncLockError {
    #[error("Failed to write lock file {path}: {details}")]
    LockWrite { path: String, details: String },

    #[error("Failed to remove lock file {path}: {details}")]
    LockRemove { path: String, details: String },

    #[error("Failed to release connection handles: {0}")]
    ConnectionRelease(String),

    #[error("Failed to reopen connection handles: {0}")]
    ConnectionReopen(String),

    #[error("Store is owned by {holder}")]
    NotOwner { holder: String },

    #[error("Store is locked by an unreadable lock record at {path}")]
    LockIndeterminate { path: String },

    #[error("Takeover request was not answered within {waited_secs:.1}s")]
    TakeoverTimedOut { waited_secs: f64, holder: Option<String> },

    #[error("Takeover cancelled after {waited_secs:.1}s")]
    TakeoverCancelled { waited_secs: f64 },

    #[error("Failed to take ownership of the store")]
    TakeoverFailed,

    #[error("Invalid owner identity '{0}'")]
    InvalidIdentity(String),

    #[error("Ownership coordinator is no longer running")]
    CoordinatorStopped,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncLockError>;
