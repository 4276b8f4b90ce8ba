//! # Stage Aggregation
//!
//! Folds one tracker map per lineage tree into request-level stage statistics.
//! Each tree is one unit per stage it touched, however many nodes it has.

use crate::error::{Result, TrackerError};
use crate::stage::Stage;
use crate::tracking::stage_tracker::SampleStageTracker;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct StageAggregator;

impl StageAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Merge per-tree trackers; output is ordered by the canonical stage order.
    ///
    /// `unknown` is never part of the output.
    pub fn aggregate<'a, I>(&self, trees: I) -> Result<BTreeMap<Stage, SampleStageTracker>>
    where
        I: IntoIterator<Item = &'a BTreeMap<Stage, SampleStageTracker>>,
    {
        let mut aggregate: BTreeMap<Stage, SampleStageTracker> = BTreeMap::new();
        let mut tree_count = 0usize;

        for trackers in trees {
            tree_count += 1;
            for (stage, tracker) in trackers {
                if *stage != tracker.stage {
                    return Err(TrackerError::AggregationInconsistency(format!(
                        "tracker for {} filed under {}",
                        tracker.stage, stage
                    )));
                }
                tracker.check_invariants()?;
                if !stage.is_reportable() {
                    continue;
                }

                let merged = aggregate
                    .entry(*stage)
                    .or_insert_with(|| SampleStageTracker::new(*stage));
                merged.add_unit();
                if tracker.has_failures() {
                    merged.add_failed();
                } else if tracker.complete {
                    merged.add_ending();
                }
                merged.merge_times(tracker.start_time, tracker.update_time);
            }
        }

        for tracker in aggregate.values_mut() {
            tracker.settle();
            tracker.check_invariants()?;
        }

        debug!(
            trees = tree_count,
            stages = aggregate.len(),
            "Aggregated stage trackers"
        );
        Ok(aggregate)
    }
}
