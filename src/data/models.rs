//! Identifier and reference types
//!
//! Records start life unpersisted. Their identifier and order index are
//! `Slot`s: unassigned until the storage layer or an ordered collection
//! fills them in. Cross-entity relations are weak references that carry
//! only the target's identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Used for reply nodes, which are created in memory and need an
/// identifier before any storage layer sees them.
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that is either not yet assigned or assigned exactly once
///
/// Serialized as `null` / the bare value so storage payloads keep their
/// nullable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<T>", into = "Option<T>")]
pub enum Slot<T: Clone> {
    Unassigned,
    Assigned(T),
}

/// Storage identifier of a record
pub type RecordId = Slot<i64>;

/// Position of a member inside an ordered collection
pub type OrderIndex = Slot<usize>;

impl<T: Clone> Slot<T> {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Slot::Assigned(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Assigned(value) => Some(value),
            Slot::Unassigned => None,
        }
    }

    /// Assign the value. A slot can only be assigned once.
    pub fn assign(&mut self, value: T) -> Result<()> {
        if self.is_assigned() {
            return Err(AppError::field("id", "already assigned").recorded());
        }
        *self = Slot::Assigned(value);
        Ok(())
    }
}

impl<T: Clone> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unassigned
    }
}

impl<T: Clone> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Slot::Assigned(value),
            None => Slot::Unassigned,
        }
    }
}

impl<T: Clone> From<Slot<T>> for Option<T> {
    fn from(slot: Slot<T>) -> Self {
        match slot {
            Slot::Assigned(value) => Some(value),
            Slot::Unassigned => None,
        }
    }
}

// =============================================================================
// Weak references
// =============================================================================

/// Reference to an account (post author, reply author, favoriting actor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRef(pub i64);

/// Reference to the artist credited on a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtistRef(pub i64);

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account:{}", self.0)
    }
}

impl fmt::Display for ArtistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artist:{}", self.0)
    }
}
