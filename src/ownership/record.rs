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

//! The ownership record stored next to every managed resource.
//!
//! A record is a single line of UTF-8 text, `identity|ticks|status`, where
//! `ticks` counts 100 ns intervals since 0001-01-01 UTC. Records written by
//! older builds omit the status field; those are read as `ACTIVE`.
//! Nothing is escaped, so neither the identity nor the status may contain
//! the `|` separator.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field separator of the on-disk format.
pub const FIELD_SEPARATOR: char = '|';

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Declared state of a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockStatus {
    /// The identity holds the store and keeps re-asserting it.
    Active,
    /// The identity asks the current owner to hand the store over.
    Pending,
    /// The previous owner let go; the identity names the new owner.
    Released,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Active => "ACTIVE",
            LockStatus::Pending => "PENDING",
            LockStatus::Released => "RELEASED",
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockStatus {
    type Err = RecordDecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(LockStatus::Active),
            "PENDING" => Ok(LockStatus::Pending),
            "RELEASED" => Ok(LockStatus::Released),
            other => Err(RecordDecodeError::UnknownStatus(other.to_string())),
        }
    }
}

/// Wall-clock timestamp in 100 ns ticks since 0001-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Ticks(i64);

impl Ticks {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let seconds = at.timestamp();
        let sub_ticks = i64::from(at.timestamp_subsec_nanos()) / NANOS_PER_TICK;
        Self(UNIX_EPOCH_TICKS + seconds * TICKS_PER_SECOND + sub_ticks)
    }

    /// Converts back to a UTC timestamp. Values outside chrono's range yield `None`.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let since_epoch = self.0.checked_sub(UNIX_EPOCH_TICKS)?;
        let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
        let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
        Utc.timestamp_opt(seconds, nanos as u32).single()
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a record could not be decoded. Callers treat every variant as an
/// indeterminate observation, never as absence or presence of an owner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordDecodeError {
    #[error("lock record is empty")]
    Empty,

    #[error("lock record has no identity")]
    MissingIdentity,

    #[error("lock record has no timestamp")]
    MissingTicks,

    #[error("lock record timestamp '{0}' is not an integer")]
    InvalidTicks(String),

    #[error("lock record timestamp '{0}' is outside the representable range")]
    TicksOutOfRange(i64),

    #[error("lock record status '{0}' is not recognised")]
    UnknownStatus(String),

    #[error("lock record has {0} fields, expected at most 3")]
    TooManyFields(usize),
}

/// One decoded ownership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    pub identity: String,
    pub ticks: Ticks,
    pub status: LockStatus,
}

impl LockRecord {
    pub fn new(identity: impl Into<String>, ticks: Ticks, status: LockStatus) -> Self {
        Self {
            identity: identity.into(),
            ticks,
            status,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.identity, self.ticks, self.status
        )
    }

    /// Strict decoder for `identity|ticks[|status]`.
    ///
    /// Surrounding whitespace (a trailing newline added by an editor or a sync
    /// client) is ignored. Anything else that does not fit the format is an error.
    pub fn decode(text: &str) -> Result<Self, RecordDecodeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RecordDecodeError::Empty);
        }

        let fields: Vec<&str> = trimmed.split(FIELD_SEPARATOR).collect();
        if fields.len() > 3 {
            return Err(RecordDecodeError::TooManyFields(fields.len()));
        }

        let identity = fields[0].trim();
        if identity.is_empty() {
            return Err(RecordDecodeError::MissingIdentity);
        }

        let ticks_field = fields.get(1).map(|t| t.trim()).unwrap_or_default();
        if ticks_field.is_empty() {
            return Err(RecordDecodeError::MissingTicks);
        }
        let ticks = ticks_field
            .parse::<i64>()
            .map(Ticks::new)
            .map_err(|_| RecordDecodeError::InvalidTicks(ticks_field.to_string()))?;
        if ticks.to_datetime().is_none() {
            return Err(RecordDecodeError::TicksOutOfRange(ticks.raw()));
        }

        let status = match fields.get(2) {
            Some(status) => status.trim().parse::<LockStatus>()?,
            None => LockStatus::Active,
        };

        Ok(Self {
            identity: identity.to_string(),
            ticks,
            status,
        })
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        self.identity == identity
    }

    /// Machine part of the identity, for "locked by ..." messages.
    pub fn machine_name(&self) -> &str {
        self.identity
            .rsplit_once(':')
            .map(|(machine, _)| machine)
            .unwrap_or(&self.identity)
    }

    /// Age of the record relative to `now`. Records stamped in the future
    /// (clock skew between machines) report zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        match self.ticks.to_datetime() {
            Some(written) if written < now => now.signed_duration_since(written),
            Some(_) => Duration::zero(),
            None => Duration::days(36_500),
        }
    }

    /// A record older than `threshold` is abandoned whatever its status says.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) > threshold
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
