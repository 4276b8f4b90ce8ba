use crate::error::{Result, TrackerError};
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Count and completion summary for one stage, per tree or per request.
///
/// `ending_count + failed_count <= size` always holds, and `complete` is true
/// exactly when every counted unit has either ended or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleStageTracker {
    pub stage: Stage,
    #[serde(rename = "totalSamples")]
    pub size: u32,
    #[serde(rename = "startingSamples")]
    pub starting_count: u32,
    #[serde(rename = "completedSamples")]
    pub ending_count: u32,
    #[serde(rename = "failedSamples")]
    pub failed_count: u32,
    pub complete: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl SampleStageTracker {
    /// Empty tracker; stages start out complete until a pending unit shows up
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            size: 0,
            starting_count: 0,
            ending_count: 0,
            failed_count: 0,
            complete: true,
            start_time: None,
            update_time: None,
        }
    }

    /// Tracker built from already-known totals
    pub fn with_counts(stage: Stage, size: u32, ending: u32, failed: u32) -> Self {
        Self {
            stage,
            size,
            starting_count: size,
            ending_count: ending,
            failed_count: failed,
            complete: ending.saturating_add(failed) == size,
            start_time: None,
            update_time: None,
        }
    }

    /// Count one more unit entering the stage
    pub fn add_unit(&mut self) {
        self.size += 1;
        self.starting_count += 1;
    }

    pub fn add_ending(&mut self) {
        self.ending_count += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed_count += 1;
    }

    pub fn mark_incomplete(&mut self) {
        self.complete = false;
    }

    /// Earliest start, latest update
    pub fn merge_times(&mut self, start: Option<DateTime<Utc>>, update: Option<DateTime<Utc>>) {
        self.start_time = match (self.start_time, start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.update_time = match (self.update_time, update) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Recompute `complete` from the counts
    pub fn settle(&mut self) {
        self.complete = self.finished_count() == self.size;
    }

    pub fn finished_count(&self) -> u32 {
        self.ending_count.saturating_add(self.failed_count)
    }

    pub fn pending_count(&self) -> u32 {
        self.size.saturating_sub(self.finished_count())
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }

    pub fn check_invariants(&self) -> Result<()> {
        let finished = u64::from(self.ending_count) + u64::from(self.failed_count);
        if finished > u64::from(self.size) {
            return Err(TrackerError::AggregationInconsistency(format!(
                "{} tracker counts {} ended and {} failed out of {}",
                self.stage, self.ending_count, self.failed_count, self.size
            )));
        }
        if self.complete != (finished == u64::from(self.size)) {
            return Err(TrackerError::AggregationInconsistency(format!(
                "{} tracker marked complete={} with {} of {} finished",
                self.stage, self.complete, finished, self.size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_tracker_is_complete_and_empty() {
        let tracker = SampleStageTracker::new(Stage::Sequencing);
        assert!(tracker.complete);
        assert_eq!(tracker.size, 0);
        assert!(tracker.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_violations_detected() {
        let mut tracker = SampleStageTracker::new(Stage::LibraryPrep);
        tracker.add_unit();
        tracker.add_ending();
        tracker.add_failed();
        assert!(matches!(
            tracker.check_invariants(),
            Err(TrackerError::AggregationInconsistency(_))
        ));

        let mut tracker = SampleStageTracker::new(Stage::LibraryPrep);
        tracker.add_unit();
        assert!(tracker.check_invariants().is_err());
        tracker.mark_incomplete();
        assert!(tracker.check_invariants().is_ok());
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_merge_times_keeps_extremes() {
        let early = Utc.timestamp_millis_opt(1_000).single();
        let late = Utc.timestamp_millis_opt(9_000).single();
        let mut tracker = SampleStageTracker::new(Stage::DataQc);
        tracker.merge_times(late, early);
        tracker.merge_times(early, late);
        tracker.merge_times(None, None);
        assert_eq!(tracker.start_time, early);
        assert_eq!(tracker.update_time, late);
    }

    #[test]
    fn test_serialized_field_names() {
        let tracker = SampleStageTracker::with_counts(Stage::LibraryPrep, 42, 41, 1);
        let json = serde_json::to_value(&tracker).unwrap();
        assert_eq!(json["stage"], "libraryPrep");
        assert_eq!(json["totalSamples"], 42);
        assert_eq!(json["completedSamples"], 41);
        assert_eq!(json["failedSamples"], 1);
        assert_eq!(json["complete"], true);
        assert!(json["startTime"].is_null());
    }
}
