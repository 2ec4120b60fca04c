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

//! Cross-machine write ownership of files in a synced folder.
//!
//! Each managed resource has a sibling `<resource>.lock` file holding one
//! [`LockRecord`]. The owner keeps re-asserting an ACTIVE record; a machine
//! that wants the store writes PENDING and waits for the owner to answer
//! with RELEASED. Everything runs on the [`Coordinator`] actor thread.

mod cancellation;
mod clock;
mod connections;
mod coordinator;
mod events;
mod grace;
mod handoff;
mod heartbeat;
mod identity;
mod monitor;
mod record;
mod store;
mod takeover;
mod timing;

pub use cancellation::{CancellationToken, interrupt_token};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connections::{ConnectionLifecycle, NoConnections, ResourceHandles};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use events::{EventBus, LossReason, OwnershipEvent};
pub use grace::GracePeriod;
pub use heartbeat::Heartbeat;
pub use identity::OwnerIdentity;
pub use monitor::{OwnershipMonitor, OwnershipSnapshot, TickOutcome};
pub use record::{FIELD_SEPARATOR, LockRecord, LockStatus, RecordDecodeError, Ticks};
pub use store::{
    LOCK_SUFFIX, LockFileStore, ManagedResource, RecordRead, lock_path_for, read_record,
    remove_record, write_record,
};
pub use takeover::{StartupOutcome, TakeoverStatus};
pub(crate) use timing::to_chrono;
pub use timing::{
    DEFAULT_GRACE_PERIOD, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_REASSERT_INTERVAL,
    DEFAULT_STALE_AFTER, OwnershipTiming,
};
