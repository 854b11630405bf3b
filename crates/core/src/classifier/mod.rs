//! Priority-bucket classifier.
//!
//! Partitions an unordered device catalog into ranked, named buckets and
//! produces the ordered transfer queue. Buckets are processed in ascending
//! rank over a shrinking pool: once a bucket claims an entry, later buckets
//! never see it, so bucket order encodes priority and exclusivity at the same
//! time. Narrow, high-priority predicates must be registered at lower ranks
//! than broader ones.

mod types;

use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::catalog::{Recording, RecordingMode};
use crate::queue::TransferQueue;

pub use types::{Bucket, BucketTally, ClassifierError, Comparator, Predicate};

/// Name of the implicit trailing bucket that collects unclaimed entries.
pub const UNSORTED_BUCKET: &str = "Unsorted";

/// Ordered set of partition rules.
#[derive(Debug, Default)]
pub struct Classifier {
    // Kept sorted by rank.
    buckets: Vec<(u32, Bucket)>,
}

/// Result of one classification pass.
#[derive(Debug)]
pub struct Classification {
    /// Transfer queue, highest priority first.
    pub queue: TransferQueue<Recording>,
    /// Per-bucket claim counts in rank order, trailing catch-all last.
    pub tallies: Vec<BucketTally>,
}

impl Classification {
    /// One-line tally summary for logs, e.g. `Locked: 3, Driving: 12`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (i, tally) in self.tallies.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {}", tally.name, tally.claimed);
            if !tally.enabled {
                out.push_str(" (disabled)");
            }
        }
        out
    }
}

impl Classifier {
    /// Creates a classifier with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bucket at the given rank.
    ///
    /// Ranks only establish relative order; they do not need to be
    /// contiguous. Registering two buckets at the same rank is rejected
    /// rather than silently letting one shadow the other.
    pub fn add_bucket(&mut self, rank: u32, bucket: Bucket) -> Result<(), ClassifierError> {
        if self.buckets.iter().any(|(r, _)| *r == rank) {
            return Err(ClassifierError::DuplicateRank(rank));
        }
        self.push_bucket(rank, bucket);
        Ok(())
    }

    fn push_bucket(&mut self, rank: u32, bucket: Bucket) {
        self.buckets.push((rank, bucket));
        self.buckets.sort_by_key(|(r, _)| *r);
    }

    /// Partitions `catalog` into the ordered transfer queue.
    ///
    /// Every entry ends up in exactly one bucket. Entries claimed by a
    /// disabled bucket are removed from the pool without being queued;
    /// everything left after the last registered bucket falls into the
    /// trailing [`UNSORTED_BUCKET`], which is always enabled.
    pub fn classify(&self, catalog: &[Recording]) -> Classification {
        let mut pool: Vec<Recording> = catalog.to_vec();
        let mut queue = TransferQueue::new();
        let mut tallies = Vec::with_capacity(self.buckets.len() + 1);

        for (_, bucket) in &self.buckets {
            let (mut claimed, rest): (Vec<_>, Vec<_>) =
                pool.into_iter().partition(|r| bucket.matches(r));
            pool = rest;

            bucket.sort(&mut claimed);
            tallies.push(BucketTally {
                name: bucket.name().to_string(),
                enabled: bucket.is_enabled(),
                claimed: claimed.len(),
            });
            if bucket.is_enabled() {
                queue.enqueue_all(claimed);
            }
        }

        if !pool.is_empty() {
            tallies.push(BucketTally {
                name: UNSORTED_BUCKET.to_string(),
                enabled: true,
                claimed: pool.len(),
            });
            queue.enqueue_all(pool);
        }

        Classification { queue, tallies }
    }
}

/// Default intra-bucket comparator: front-lens entries sort before all other
/// lenses regardless of timestamp; within the same lens tier, the recording
/// with the later start time comes first.
pub fn newest_front_first(a: &Recording, b: &Recording) -> Ordering {
    match (a.lens.is_front(), b.lens.is_front()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.start.cmp(&a.start),
    }
}

/// The production bucket set: locked driving footage first, then any other
/// locked footage, then ordinary driving footage, then parking footage.
/// The parking bucket is registered even when disabled so that parking
/// entries are claimed (and counted) instead of leaking into the catch-all.
pub fn standard_buckets(include_parking: bool) -> Classifier {
    let mut classifier = Classifier::new();
    classifier.push_bucket(
        0,
        Bucket::new("Locked driving", |r| {
            r.locked && r.mode != RecordingMode::Parking
        })
        .with_comparator(newest_front_first),
    );
    classifier.push_bucket(
        1,
        Bucket::new("Locked", |r| r.locked).with_comparator(newest_front_first),
    );
    classifier.push_bucket(
        2,
        Bucket::new("Driving", |r| r.mode == RecordingMode::Normal)
            .with_comparator(newest_front_first),
    );
    classifier.push_bucket(
        3,
        Bucket::new("Parking", |r| r.mode == RecordingMode::Parking)
            .with_comparator(newest_front_first)
            .enabled(include_parking),
    );
    classifier
}
