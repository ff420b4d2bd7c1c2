// ⚙️ Engine Configuration - JSON file + environment overrides
//
// Precedence (lowest to highest): built-in defaults, the JSON file, then
// LISTING_MERGE_* environment variables.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::budget::{Deadline, ExecutionBudget, Unbounded};
use crate::finder::{DEFAULT_THRESHOLD, MAX_THRESHOLD, MIN_THRESHOLD};

pub const ENV_DATABASE: &str = "LISTING_MERGE_DB";
pub const ENV_THRESHOLD: &str = "LISTING_MERGE_THRESHOLD";
pub const ENV_TIME_BUDGET_MS: &str = "LISTING_MERGE_TIME_BUDGET_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// SQLite file holding listings and relationships
    pub database_path: PathBuf,

    /// Used by `find_duplicates` when the caller passes no threshold
    pub default_threshold: f64,

    /// Cluster pairs into groups in `find_duplicates` responses
    pub group_duplicates: bool,

    /// Wall-clock budget for one `execute_merge` call. None = unbounded.
    pub time_budget_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("listings.db"),
            default_threshold: DEFAULT_THRESHOLD,
            group_duplicates: false,
            time_budget_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => EngineConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply LISTING_MERGE_* values returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(db);
        }

        if let Some(raw) = lookup(ENV_THRESHOLD) {
            self.default_threshold = raw
                .trim()
                .parse()
                .with_context(|| format!("{} is not a number: {}", ENV_THRESHOLD, raw))?;
        }

        if let Some(raw) = lookup(ENV_TIME_BUDGET_MS) {
            let raw = raw.trim();
            self.time_budget_ms = if raw.is_empty() || raw == "0" {
                None
            } else {
                Some(
                    raw.parse()
                        .with_context(|| format!("{} is not a whole number: {}", ENV_TIME_BUDGET_MS, raw))?,
                )
            };
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&self.default_threshold) {
            bail!(
                "defaultThreshold must be between {} and {}, got {}",
                MIN_THRESHOLD,
                MAX_THRESHOLD,
                self.default_threshold
            );
        }
        if self.database_path.as_os_str().is_empty() {
            bail!("databasePath must not be empty");
        }
        Ok(())
    }

    /// Fresh budget for one merge call
    pub fn budget(&self) -> Box<dyn ExecutionBudget> {
        match self.time_budget_ms {
            Some(ms) => Box::new(Deadline::after(Duration::from_millis(ms))),
            None => Box::new(Unbounded),
        }
    }
}
