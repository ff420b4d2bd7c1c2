// 🧩 Merge Engine - the three operations an admin API layer calls
//
// Validates caller input, then hands off to the finder, planner and
// executor. Each call is one short-lived unit of work over the repository;
// nothing is cached between calls.

use log::{debug, info};

use crate::budget::ExecutionBudget;
use crate::config::EngineConfig;
use crate::db::EntityRepository;
use crate::entities::{EntityKind, MergePair};
use crate::error::MergeError;
use crate::executor::{MergeExecutor, MergeResult};
use crate::finder::{DuplicateFinder, FindDuplicatesResponse, FindScope, MAX_THRESHOLD, MIN_THRESHOLD};
use crate::planner::{MergePlanner, MergePreview};

pub struct MergeEngine<R: EntityRepository> {
    repo: R,
    config: EngineConfig,
}

impl<R: EntityRepository> MergeEngine<R> {
    pub fn new(repo: R, config: EngineConfig) -> Self {
        MergeEngine { repo, config }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // FIND
    // ========================================================================

    /// Every pair of `kind` at or above `threshold` (config default when None)
    pub fn find_duplicates(
        &self,
        kind: EntityKind,
        threshold: Option<f64>,
    ) -> Result<FindDuplicatesResponse, MergeError> {
        self.find_duplicates_in(kind, threshold, &FindScope::default())
    }

    pub fn find_duplicates_in(
        &self,
        kind: EntityKind,
        threshold: Option<f64>,
        scope: &FindScope,
    ) -> Result<FindDuplicatesResponse, MergeError> {
        let threshold = validate_threshold(threshold.unwrap_or(self.config.default_threshold))?;

        let listings = self.repo.list(kind, scope)?;
        debug!("Comparing {} {} at threshold {}", listings.len(), kind, threshold);

        let response = DuplicateFinder::new(threshold)
            .with_grouping(self.config.group_duplicates)
            .find(&listings);

        info!(
            "Found {} duplicate pair(s) among {} {}",
            response.pairs.len(),
            response.total_entities,
            kind
        );
        Ok(response)
    }

    // ========================================================================
    // PREVIEW
    // ========================================================================

    pub fn preview_merge(
        &self,
        kind: EntityKind,
        primary_id: &str,
        duplicate_id: &str,
    ) -> Result<MergePreview, MergeError> {
        let pair = merge_pair(kind, primary_id, duplicate_id)?;
        let preview = MergePlanner::new(&self.repo).preview(&pair)?;

        debug!(
            "Preview {}: {} row(s) to transfer, {} warning(s), canMerge={}",
            pair,
            preview.relationships_to_transfer.total(),
            preview.warnings.len(),
            preview.can_merge
        );
        Ok(preview)
    }

    // ========================================================================
    // EXECUTE
    // ========================================================================

    /// Merge under the configured time budget
    pub fn execute_merge(
        &self,
        kind: EntityKind,
        primary_id: &str,
        duplicate_id: &str,
    ) -> Result<MergeResult, MergeError> {
        let budget = self.config.budget();
        self.execute_merge_within(kind, primary_id, duplicate_id, budget.as_ref())
    }

    /// Merge under a budget supplied by the host
    pub fn execute_merge_within(
        &self,
        kind: EntityKind,
        primary_id: &str,
        duplicate_id: &str,
        budget: &dyn ExecutionBudget,
    ) -> Result<MergeResult, MergeError> {
        let pair = merge_pair(kind, primary_id, duplicate_id)?;
        info!("Executing merge {}", pair);
        MergeExecutor::new(&self.repo, budget).execute(&pair)
    }
}

/// Reject thresholds outside [0.5, 1.0] (NaN included)
pub fn validate_threshold(threshold: f64) -> Result<f64, MergeError> {
    if (MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(MergeError::InvalidInput(format!(
            "threshold must be between {} and {}, got {}",
            MIN_THRESHOLD, MAX_THRESHOLD, threshold
        )))
    }
}

fn merge_pair(kind: EntityKind, primary_id: &str, duplicate_id: &str) -> Result<MergePair, MergeError> {
    let primary_id = primary_id.trim();
    let duplicate_id = duplicate_id.trim();

    if primary_id.is_empty() || duplicate_id.is_empty() {
        return Err(MergeError::InvalidInput(
            "primaryId and duplicateId are required".to_string(),
        ));
    }

    Ok(MergePair::new(kind, primary_id, duplicate_id))
}
