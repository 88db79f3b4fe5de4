//! Result aggregation for one batch run.
//!
//! The aggregator owns the [`RunningCounters`] and the success list. Callers
//! share it behind a mutex; each [`ResultAggregator::record`] call is one
//! short critical section.

use crate::error::CoreError;

use super::event::{BatchResult, BatchSummary, ProgressSnapshot, RunningCounters};
use super::job::Job;
use super::outcome::JobOutcome;

/// Lifecycle of a run as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Complete,
}

/// How the final result list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOrder {
    /// Order in which jobs settled.
    Settlement,
    /// Order in which templates were submitted.
    Submission,
}

#[derive(Debug)]
pub struct ResultAggregator {
    total: usize,
    counters: RunningCounters,
    results: Vec<BatchResult>,
    state: BatchState,
}

impl ResultAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            counters: RunningCounters::default(),
            results: Vec::new(),
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn counters(&self) -> RunningCounters {
        self.counters
    }

    /// Move from `Idle` to `Running`.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.state != BatchState::Idle {
            return Err(CoreError::Conflict(format!(
                "Batch cannot start from state {:?}",
                self.state
            )));
        }
        self.state = BatchState::Running;
        Ok(())
    }

    /// Record one settled job and return its progress position.
    ///
    /// Rejects records outside `Running` and records beyond `total`, so a
    /// job can never be counted twice into a closed set.
    pub fn record(&mut self, job: &Job, outcome: &JobOutcome) -> Result<ProgressSnapshot, CoreError> {
        if self.state != BatchState::Running {
            return Err(CoreError::Conflict(format!(
                "Cannot record job '{}' while batch is {:?}",
                job.id, self.state
            )));
        }
        if self.counters.completed >= self.total {
            return Err(CoreError::Conflict(format!(
                "Cannot record job '{}': all {} jobs already settled",
                job.id, self.total
            )));
        }

        self.counters.completed += 1;
        match outcome {
            JobOutcome::Ok(image) => {
                self.counters.succeeded += 1;
                self.results.push(BatchResult {
                    template_id: job.id.clone(),
                    template_name: job.display_name.clone(),
                    image_url: image.output_url.clone(),
                    prompt: job.prompt.clone(),
                    model: job.model.clone(),
                    saved: image.persisted,
                    image_record_id: image.record_id.clone(),
                    position: job.position,
                });
            }
            JobOutcome::EmptyInput { .. } | JobOutcome::Failed { .. } => {
                self.counters.failed += 1;
            }
        }

        Ok(ProgressSnapshot {
            current: self.counters.completed,
            total: self.total,
        })
    }

    /// Close the run and hand out the summary.
    ///
    /// Callers invoke this only after every dispatched job has settled; a
    /// short count is logged rather than hidden.
    pub fn finish(&mut self, order: ResultOrder) -> BatchSummary {
        if self.counters.completed != self.total {
            tracing::warn!(
                completed = self.counters.completed,
                total = self.total,
                "Batch finished with unsettled jobs",
            );
        }
        self.state = BatchState::Complete;

        let mut results = std::mem::take(&mut self.results);
        if order == ResultOrder::Submission {
            results.sort_by_key(|r| r.position);
        }

        BatchSummary {
            total: self.total,
            counters: self.counters,
            results,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::batch::outcome::GeneratedImage;

    fn job(id: &str, position: usize) -> Job {
        Job {
            id: id.to_string(),
            display_name: format!("Job {id}"),
            prompt: "a prompt".to_string(),
            model: "m".to_string(),
            reference_image_url: None,
            position,
        }
    }

    fn ok(url: &str) -> JobOutcome {
        JobOutcome::Ok(GeneratedImage::rendered(url))
    }

    #[test]
    fn counts_add_up_after_every_job_settles() {
        let mut agg = ResultAggregator::new(3);
        agg.start().unwrap();

        let first = agg.record(&job("a", 0), &ok("https://x/a.png")).unwrap();
        agg.record(&job("b", 1), &JobOutcome::empty_prompt()).unwrap();
        let last = agg.record(&job("c", 2), &JobOutcome::failed(Some("boom"))).unwrap();

        assert_eq!(first, ProgressSnapshot { current: 1, total: 3 });
        assert_eq!(last, ProgressSnapshot { current: 3, total: 3 });

        let summary = agg.finish(ResultOrder::Settlement);
        assert_eq!(
            summary.counters,
            RunningCounters {
                completed: 3,
                succeeded: 1,
                failed: 2
            }
        );
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].template_id, "a");
        assert_eq!(agg.state(), BatchState::Complete);
    }

    #[test]
    fn record_before_start_is_rejected() {
        let mut agg = ResultAggregator::new(1);
        let result = agg.record(&job("a", 0), &ok("u"));
        assert_matches!(result, Err(CoreError::Conflict(_)));
        assert_eq!(agg.counters(), RunningCounters::default());
    }

    #[test]
    fn record_beyond_total_is_rejected() {
        let mut agg = ResultAggregator::new(1);
        agg.start().unwrap();
        agg.record(&job("a", 0), &ok("u")).unwrap();
        assert_matches!(agg.record(&job("a", 0), &ok("u")), Err(CoreError::Conflict(_)));
        assert_eq!(agg.counters().completed, 1);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut agg = ResultAggregator::new(1);
        agg.start().unwrap();
        assert_matches!(agg.start(), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn submission_order_sorts_results_by_position() {
        let mut agg = ResultAggregator::new(3);
        agg.start().unwrap();
        agg.record(&job("c", 2), &ok("u2")).unwrap();
        agg.record(&job("a", 0), &ok("u0")).unwrap();
        agg.record(&job("b", 1), &ok("u1")).unwrap();

        let summary = agg.finish(ResultOrder::Submission);
        let ids: Vec<_> = summary.results.iter().map(|r| r.template_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn settlement_order_is_kept_by_default() {
        let mut agg = ResultAggregator::new(2);
        agg.start().unwrap();
        agg.record(&job("b", 1), &ok("u1")).unwrap();
        agg.record(&job("a", 0), &ok("u0")).unwrap();

        let summary = agg.finish(ResultOrder::Settlement);
        let ids: Vec<_> = summary.results.iter().map(|r| r.template_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }
}
