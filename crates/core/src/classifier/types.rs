//! Bucket definitions for the priority classifier.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Recording;

/// Membership predicate over catalog entries.
pub type Predicate = Box<dyn Fn(&Recording) -> bool + Send + Sync>;

/// Intra-bucket ordering function.
pub type Comparator = Box<dyn Fn(&Recording, &Recording) -> Ordering + Send + Sync>;

/// Errors that can occur while configuring the classifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    /// Two buckets registered at the same rank. The relative priority would
    /// be ambiguous, so this is treated as a configuration error.
    #[error("duplicate bucket rank: {0}")]
    DuplicateRank(u32),
}

/// A named, ranked partition rule establishing relative transfer priority.
///
/// Buckets claim entries whether or not they are enabled; a disabled bucket
/// removes its matches from the pool without emitting them, which excludes
/// them from the queue for that cycle.
pub struct Bucket {
    name: String,
    enabled: bool,
    predicate: Predicate,
    comparator: Option<Comparator>,
}

impl Bucket {
    /// Creates an enabled bucket with the given membership predicate.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Recording) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            predicate: Box::new(predicate),
            comparator: None,
        }
    }

    /// Sets the intra-bucket comparator.
    pub fn with_comparator(
        mut self,
        comparator: impl Fn(&Recording, &Recording) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Enables or disables the bucket. Disabled buckets still claim entries.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Bucket name, used in tallies and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether matches are emitted into the queue.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(super) fn matches(&self, recording: &Recording) -> bool {
        (self.predicate)(recording)
    }

    pub(super) fn sort(&self, selection: &mut [Recording]) {
        if let Some(comparator) = &self.comparator {
            selection.sort_by(|a, b| comparator(a, b));
        }
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("has_comparator", &self.comparator.is_some())
            .finish()
    }
}

/// Per-bucket result of one classification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTally {
    /// Bucket name.
    pub name: String,
    /// Whether the bucket contributed to the queue.
    pub enabled: bool,
    /// Number of entries the bucket claimed from the pool. For a disabled
    /// bucket these entries were dropped from the cycle.
    pub claimed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_builder() {
        let bucket = Bucket::new("locked", |r| r.locked).enabled(false);
        assert_eq!(bucket.name(), "locked");
        assert!(!bucket.is_enabled());
    }

    #[test]
    fn test_duplicate_rank_display() {
        let err = ClassifierError::DuplicateRank(3);
        assert_eq!(err.to_string(), "duplicate bucket rank: 3");
    }

    #[test]
    fn test_tally_serialization() {
        let tally = BucketTally {
            name: "Parking".to_string(),
            enabled: false,
            claimed: 2,
        };
        let json = serde_json::to_string(&tally).unwrap();
        let parsed: BucketTally = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tally);
    }
}
