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

use crate::error::SyncLockError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a SyncLockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a SyncLockError) -> Self {
        let (suggestion, details) = match error {
            SyncLockError::NotOwner { holder } => {
                let suggestion = Some(
                    "The store is read-only on this machine. Run 'synclock hold --takeover' to \
                     ask the current owner to hand it over."
                        .to_string(),
                );
                let details = Some(format!("Locked by another machine: {holder}"));
                (suggestion, details)
            }
            SyncLockError::LockIndeterminate { path } => {
                let suggestion = Some(
                    "The sync client may still be rewriting the lock file. Wait a moment and try \
                     again, or inspect it with 'synclock status'."
                        .to_string(),
                );
                let details = Some(format!("Could not decode {path}"));
                (suggestion, details)
            }
            SyncLockError::TakeoverTimedOut { holder, .. } => {
                let suggestion = Some(
                    "The current owner did not release the store. Make sure it is running and \
                     its sync client is online, or raise takeover_timeout_secs."
                        .to_string(),
                );
                let details = holder
                    .as_ref()
                    .map(|holder| format!("Last observed record: {holder}"));
                (suggestion, details)
            }
            SyncLockError::TakeoverFailed => {
                let suggestion = Some(
                    "Another machine may be using the store. Check 'synclock status' and retry."
                        .to_string(),
                );
                (suggestion, None)
            }
            SyncLockError::LockWrite { path, details } | SyncLockError::LockRemove { path, details } => {
                let suggestion = if cfg!(unix) {
                    Some(format!("Ensure you have write permissions to: {path}"))
                } else {
                    Some(format!(
                        "Ensure the folder is not read-only and you have write permissions to: \
                         {path}"
                    ))
                };
                (suggestion, Some(details.clone()))
            }
            SyncLockError::InvalidConfig(msg) | SyncLockError::ConfigError(msg) => {
                let suggestion = Some(
                    "Check config.toml in the synclock home directory (SYNCLOCK_HOME) and the \
                     SYNCLOCK_* environment variables."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            SyncLockError::DirectoryNotFound(dir) => {
                let suggestion = Some(format!("Ensure the directory exists: {dir}"));
                (suggestion, None)
            }
            SyncLockError::Io(io_err) => {
                let suggestion = match io_err.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        if cfg!(unix) {
                            Some("Check file permissions on the synced folder.".to_string())
                        } else {
                            Some(
                                "Check file permissions and that the sync client is not holding \
                                 the file."
                                    .to_string(),
                            )
                        }
                    }
                    std::io::ErrorKind::NotFound => Some(
                        "Ensure the file or directory exists and the path is correct.".to_string(),
                    ),
                    _ => None,
                };
                let details = Some(format!("I/O error: {io_err}"));
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
