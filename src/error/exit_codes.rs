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

pub fn get_exit_code(error: &SyncLockError) -> i32 {
    match error {
        SyncLockError::InvalidConfig(_)
        | SyncLockError::ConfigError(_)
        | SyncLockError::InvalidIdentity(_) => 2,

        SyncLockError::NotOwner { .. } | SyncLockError::LockIndeterminate { .. } => 4,

        SyncLockError::TakeoverTimedOut { .. } | SyncLockError::TakeoverFailed => 5,

        SyncLockError::LockWrite { .. } | SyncLockError::LockRemove { .. } => 13,

        SyncLockError::TakeoverCancelled { .. } => 130, // Conventional SIGINT exit code

        _ => 1,
    }
}
