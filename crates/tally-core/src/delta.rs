//! # Change-Log Deltas
//!
//! Change notifications from the data source and their classification.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Delta Classification                               │
//! │                                                                         │
//! │  change log (since cursor)          DeltasResult                       │
//! │  ─────────────────────────          ────────────                       │
//! │  { dbId: 10, ADDED   }      ──►     additions = { 10 }                 │
//! │  { dbId: 20, UPDATED }              updates   = { 20 }                 │
//! │  { dbId: 30, UPDATED }              deletions = { 30 }                 │
//! │  { dbId: 30, DELETED }              cursor    = cursor of last record  │
//! │                                                                         │
//! │  DELETION WINS: an id in `deletions` is removed from `additions` and   │
//! │  `updates`. Within the retention window a deletion always post-dates   │
//! │  any earlier add/update of the same id.                                 │
//! │                                                                         │
//! │  Change records expire at the source after ~3 days.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::items::Cursor;
use crate::value::{Scalar, Value};

// =============================================================================
// Mutation Kind
// =============================================================================

/// The kind of change recorded for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    Added,
    Updated,
    Deleted,
}

impl MutationKind {
    /// Wire / column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Added => "ADDED",
            MutationKind::Updated => "UPDATED",
            MutationKind::Deleted => "DELETED",
        }
    }

    /// The value written to the `mutationType` column.
    pub fn to_value(self) -> Value {
        Value::text(self.as_str())
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDED" => Ok(MutationKind::Added),
            "UPDATED" => Ok(MutationKind::Updated),
            "DELETED" => Ok(MutationKind::Deleted),
            other => Err(CoreError::UnknownMutationKind(other.to_string())),
        }
    }
}

// =============================================================================
// Entity Id
// =============================================================================

/// Identifier of a replicated entity. The source uses numeric ids for most
/// collections and string-encoded 64-bit ids for some.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    /// Reads an id from a record value.
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::Scalar(Scalar::Int(i)) => Ok(EntityId::Int(*i)),
            Value::Scalar(Scalar::Text(s)) => Ok(EntityId::Text(s.clone())),
            other => Err(CoreError::InvalidId(format!("{:?}", other))),
        }
    }

    /// Converts the id back into a record value.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(i) => Value::int(*i),
            EntityId::Text(s) => Value::text(s.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(i) => write!(f, "{}", i),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(i: i64) -> Self {
        EntityId::Int(i)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

// =============================================================================
// Delta Record
// =============================================================================

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    pub id: EntityId,
    pub kind: MutationKind,
}

impl DeltaRecord {
    pub fn new(id: impl Into<EntityId>, kind: MutationKind) -> Self {
        DeltaRecord {
            id: id.into(),
            kind,
        }
    }

    /// Parses a change-log node of shape `{ <id_field>, mutationType }`.
    pub fn from_node(node: &Value, id_field: &str) -> CoreResult<Self> {
        let id = node
            .get(id_field)
            .ok_or_else(|| CoreError::MissingField(id_field.to_string()))
            .and_then(EntityId::from_value)?;

        let kind = node
            .get(crate::MUTATION_TYPE_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MissingField(crate::MUTATION_TYPE_FIELD.to_string()))?
            .parse()?;

        Ok(DeltaRecord { id, kind })
    }
}

// =============================================================================
// Deltas Result
// =============================================================================

/// A classified batch of change notifications.
///
/// The three sets are disjoint: deletion wins over addition and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltasResult {
    pub additions: BTreeSet<EntityId>,
    pub updates: BTreeSet<EntityId>,
    pub deletions: BTreeSet<EntityId>,
    /// Cursor of the last change record observed, if any.
    pub cursor: Option<Cursor>,
}

impl DeltasResult {
    /// Classifies records by mutation kind, deduplicates by id and applies
    /// deletion precedence.
    pub fn classify<I>(records: I, cursor: Option<Cursor>) -> Self
    where
        I: IntoIterator<Item = DeltaRecord>,
    {
        let mut result = DeltasResult {
            cursor,
            ..Default::default()
        };

        for record in records {
            match record.kind {
                MutationKind::Added => result.additions.insert(record.id),
                MutationKind::Updated => result.updates.insert(record.id),
                MutationKind::Deleted => result.deletions.insert(record.id),
            };
        }

        let deletions = &result.deletions;
        result.additions.retain(|id| !deletions.contains(id));
        result.updates.retain(|id| !deletions.contains(id));

        result
    }

    pub fn additions(&self) -> &BTreeSet<EntityId> {
        &self.additions
    }

    pub fn updates(&self) -> &BTreeSet<EntityId> {
        &self.updates
    }

    pub fn deletions(&self) -> &BTreeSet<EntityId> {
        &self.deletions
    }

    /// True when at least one of the three sets is non-empty.
    pub fn has_changes(&self) -> bool {
        !(self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty())
    }

    /// Total number of distinct ids across all sets.
    pub fn len(&self) -> usize {
        self.additions.len() + self.updates.len() + self.deletions.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }
}
