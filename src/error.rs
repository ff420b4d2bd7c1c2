//! Error types for the duplicate detection & merge engine
//!
//! Errors are classified by what a caller should do next:
//! - Retryable: the compute budget ran out or the host interrupted a statement.
//!   Every merge step is idempotent, so a retry makes forward progress.
//! - NonRetryable: missing records, bad input, uniqueness conflicts the
//!   skip-and-delete rule cannot resolve, other storage failures.

use std::fmt;

use thiserror::Error;

use crate::entities::{EntityKind, MergePair};
use crate::relationships::Edge;

/// The step of a merge at which something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    Validate,
    Transfer(Edge),
    MergeAttributes,
    DeleteDuplicate,
    Reload,
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStep::Validate => write!(f, "validate"),
            MergeStep::Transfer(edge) => write!(f, "transfer {}", edge.label()),
            MergeStep::MergeAttributes => write!(f, "merge attributes"),
            MergeStep::DeleteDuplicate => write!(f, "delete duplicate"),
            MergeStep::Reload => write!(f, "reload primary"),
        }
    }
}

/// Failures raised by an [`EntityRepository`](crate::db::EntityRepository).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// The host interrupted a running statement (compute budget exceeded).
    #[error("Statement interrupted by host")]
    Interrupted,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                StoreError::Interrupted
            }
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(message.unwrap_or_else(|| code.to_string()))
            }
            other => StoreError::Sqlite(other),
        }
    }
}

/// Errors surfaced by `find_duplicates`, `preview_merge` and `execute_merge`.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{kind} record not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict while merging {pair} at step '{step}': {detail}")]
    Conflict {
        pair: MergePair,
        step: MergeStep,
        detail: String,
    },

    #[error("Compute budget exhausted while merging {pair} before step '{step}'; retry to resume")]
    ResourceExhausted { pair: MergePair, step: MergeStep },

    #[error("Merge of {pair} failed at step '{step}': {source}")]
    StepFailed {
        pair: MergePair,
        step: MergeStep,
        #[source]
        source: StoreError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    /// Classify a storage failure raised while executing `step` of a merge.
    pub fn at_step(pair: &MergePair, step: MergeStep, err: StoreError) -> Self {
        match err {
            StoreError::Interrupted => MergeError::ResourceExhausted {
                pair: pair.clone(),
                step,
            },
            StoreError::Constraint(detail) => MergeError::Conflict {
                pair: pair.clone(),
                step,
                detail,
            },
            other => MergeError::StepFailed {
                pair: pair.clone(),
                step,
                source: other,
            },
        }
    }

    /// Returns true if retrying the same call is expected to make progress
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MergeError::ResourceExhausted { .. } | MergeError::Store(StoreError::Interrupted)
        )
    }

    /// Returns true if the host's compute/time budget was exceeded
    pub fn is_timeout(&self) -> bool {
        self.is_retryable()
    }

    /// The step at which a merge stopped, if this error came from one
    pub fn step(&self) -> Option<MergeStep> {
        match self {
            MergeError::Conflict { step, .. }
            | MergeError::ResourceExhausted { step, .. }
            | MergeError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MergeError::NotFound { .. } => "Refresh the duplicate list; one of the records no longer exists.",
            MergeError::InvalidInput(_) => "Pick two different records of the same kind.",
            MergeError::Conflict { .. } => "Resolve the conflicting relationship rows manually, then retry.",
            MergeError::ResourceExhausted { .. } | MergeError::Store(StoreError::Interrupted) => {
                "The merge ran out of time. Try again; it will continue where it stopped."
            }
            MergeError::StepFailed { .. } | MergeError::Store(_) => "Check the database and retry.",
        }
    }
}
