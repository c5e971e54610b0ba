// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker and scheduler identifier types.
//!
//! Both identifier spaces are 64-bit unsigned integers with `0` and
//! `u64::MAX` reserved as "invalid" sentinels. MoleQueue ids are assigned
//! densely by the job manager and never reused within a process lifetime;
//! queue ids come from whatever executes the job (a PID locally, a batch
//! id remotely).

use serde::{Deserialize, Serialize};

/// Raw identifier type shared by [`MoleQueueId`] and [`QueueId`].
pub type IdType = u64;

/// Reserved sentinel values that never name a real job.
const INVALID_LOW: IdType = 0;
const INVALID_HIGH: IdType = u64::MAX;

/// Define a newtype ID wrapper around [`IdType`].
///
/// Generates `new()`, `value()`, `is_valid()`, an `INVALID` constant,
/// `Display`, and `From<IdType>`.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub IdType);

        impl $name {
            /// Sentinel for "no such id".
            pub const INVALID: Self = Self(INVALID_HIGH);

            pub fn new(id: IdType) -> Self {
                Self(id)
            }

            pub fn value(self) -> IdType {
                self.0
            }

            /// False for both reserved sentinels.
            pub fn is_valid(self) -> bool {
                self.0 != INVALID_LOW && self.0 != INVALID_HIGH
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<IdType> for $name {
            fn from(id: IdType) -> Self {
                Self(id)
            }
        }
    };
}

define_numeric_id! {
    /// Broker-assigned identifier for a job.
    ///
    /// Assigned exactly once when the job manager inserts the job and
    /// unique for the lifetime of the process.
    pub struct MoleQueueId;
}

define_numeric_id! {
    /// Scheduler-assigned identifier for a job.
    ///
    /// A PID for locally executed jobs, a batch id for jobs submitted to
    /// a remote scheduler. Invalid until the executor reports one.
    pub struct QueueId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
