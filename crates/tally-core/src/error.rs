//! # Error Types
//!
//! Domain errors raised by the pure replication model.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  └── CoreError        - Malformed selections, ids, mutation kinds      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - State persistence failures                     │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  └── SyncError        - Transport / storage / serialization / config   │
//! │                                                                         │
//! │  Flow: CoreError → SyncError → worker (logged, non-zero exit)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors produced by the pure data model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A GraphQL field selection has a `}` without a matching `{`, or ends
    /// with unclosed braces.
    #[error("Unbalanced braces in field selection at offset {offset}")]
    UnbalancedBraces { offset: usize },

    /// A `{` in a field selection that does not follow a field name.
    #[error("Nested selection without a parent field at offset {offset}")]
    OrphanSelection { offset: usize },

    /// A character that cannot appear in a plain field selection.
    #[error("Unexpected character {found:?} in field selection at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },

    /// Unknown change-log mutation kind.
    #[error("Unknown mutation kind: {0}")]
    UnknownMutationKind(String),

    /// A record is missing a field that must be present.
    #[error("Record is missing field '{0}'")]
    MissingField(String),

    /// A value cannot be used as an entity identifier.
    #[error("Value cannot be used as an entity id: {0}")]
    InvalidId(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
