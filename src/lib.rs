// Listing Merge Engine - Core Library
// Duplicate detection and merging for venues, events, vendors and promoters.
// Exposes all modules for use in the CLI, an admin API layer, and tests.

pub mod budget;        // Execution budget - explicit timeout signal
pub mod config;        // EngineConfig - JSON file + env overrides
pub mod db;            // SQLite schema, EntityRepository, merge ledger
pub mod engine;        // MergeEngine facade - find / preview / execute
pub mod entities;      // Venue, Event, Vendor, Promoter
pub mod error;         // MergeError, StoreError, MergeStep
pub mod executor;      // Merge Executor - idempotent, resumable steps
pub mod finder;        // Duplicate Finder + union-find grouping
pub mod planner;       // Merge Planner - read-only preview
pub mod relationships; // Relationship edges shared by planner and executor
pub mod similarity;    // Similarity Scorer

// Re-export commonly used types
pub use budget::{Deadline, ExecutionBudget, StepBudget, Unbounded};
pub use config::EngineConfig;
pub use db::{setup_database, EntityRepository, LedgerEntry, LedgerStatus, SqliteRepository};
pub use engine::{validate_threshold, MergeEngine};
pub use entities::{EntityKind, Event, EventStatus, Listing, MergePair, Promoter, Vendor, Venue};
pub use error::{MergeError, MergeStep, StoreError};
pub use executor::{MergeExecutor, MergeResult};
pub use finder::{
    DuplicateFinder, DuplicateGroup, DuplicatePair, FindDuplicatesResponse, FindScope,
    DEFAULT_THRESHOLD,
};
pub use planner::{MergePlanner, MergePreview, Warning};
pub use relationships::{
    edges_for, ApplicationStatus, Edge, EdgeCount, EventVendorApplication, Favorite,
    RelationshipBucket, RelationshipCounts,
};
pub use similarity::Similarity;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
