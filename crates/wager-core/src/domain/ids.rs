//! Domain identifiers (strongly-typed IDs).
//!
//! IDs are ULIDs wrapped in a phantom-typed `Id<T>`:
//! - sortable by creation time, so history can be ordered by id when needed
//! - generated without coordination through the `IdGenerator` port
//! - `EnvelopeId` and `SnapshotId` cannot be mixed up at compile time

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each ID kind.
///
/// Supplies the prefix used by `Display` ("env-", "snap-").
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
///
/// `T` only exists at compile time (PhantomData).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for task envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Envelope {}

impl IdMarker for Envelope {
    fn prefix() -> &'static str {
        "env-"
    }
}

/// Marker for snapshots committed by the in-memory snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Snapshot {}

impl IdMarker for Snapshot {
    fn prefix() -> &'static str {
        "snap-"
    }
}

/// Identifier of one unit of work; unique for the lifetime of a run.
pub type EnvelopeId = Id<Envelope>;

/// Identifier of a committed snapshot.
pub type SnapshotId = Id<Snapshot>;
