//! Core types for execution results and options

use crate::error::{Error, ErrorCategory};
use serde::{Deserialize, Serialize};

/// Result of applying one planned change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was updated in place
    Updated,
    /// Resource was deleted and created again
    Replaced,
    /// Resource was deleted
    Deleted,
    /// Apply failed
    Failed {
        error: String,
        category: ErrorCategory,
    },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ChangeResult {
    /// Failed result carrying the error's category
    pub fn failed(error: &Error) -> Self {
        Self::Failed {
            error: error.to_string(),
            category: error.category(),
        }
    }

    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Updated | Self::Replaced | Self::Deleted
        )
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of changes processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ChangeResult) {
        match result {
            ChangeResult::NoChange => self.no_change += 1,
            ChangeResult::Created => self.created += 1,
            ChangeResult::Updated => self.updated += 1,
            ChangeResult::Replaced => self.replaced += 1,
            ChangeResult::Deleted => self.deleted += 1,
            ChangeResult::Failed { .. } => self.failed += 1,
            ChangeResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of changes applied in parallel
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ChangeResult::Created);
        summary.add_result(&ChangeResult::Updated);
        summary.add_result(&ChangeResult::NoChange);
        summary.add_result(&ChangeResult::failed(&Error::validation("name", "boom")));

        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_change_result_flags() {
        assert!(ChangeResult::Replaced.is_change());
        assert!(!ChangeResult::NoChange.is_change());
        assert!(ChangeResult::Skipped { reason: "x".into() }.is_success());
        assert!(!ChangeResult::failed(&Error::inconsistent("x", "y")).is_success());
    }

    #[test]
    fn test_failed_keeps_category() {
        let err = Error::from(crate::error::RemoteError::status(404, "gone"));
        match ChangeResult::failed(&err) {
            ChangeResult::Failed { error, category } => {
                assert!(error.contains("HTTP 404"));
                assert_eq!(category, ErrorCategory::NotFound);
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }
}
