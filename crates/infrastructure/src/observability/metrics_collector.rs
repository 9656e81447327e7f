use metrics::{counter, histogram, Counter, Histogram};
use tracing::debug;

use batchsync_domain::{Job, JobKind};

/// Metrics collector for the sync scheduler
///
/// Handles are registered against the global recorder. Without an installed recorder every
/// call is a no-op, so tests and the CLI commands can use the collector freely.
#[derive(Clone)]
pub struct MetricsCollector {
    schedule_pass_duration: Histogram,
    transition_conflicts_total: Counter,
    occurrences_suppressed_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            schedule_pass_duration: histogram!("batchsync_schedule_pass_duration_seconds"),
            transition_conflicts_total: counter!("batchsync_transition_conflicts_total"),
            occurrences_suppressed_total: counter!("batchsync_occurrences_suppressed_total"),
        }
    }

    /// Record a job persisted in `SCHEDULE` state
    pub fn record_job_created(&self, kind: JobKind, scheduled: bool) {
        let origin = if scheduled { "schedule" } else { "request" };
        counter!(
            "batchsync_jobs_created_total",
            "kind" => kind.as_str(),
            "origin" => origin
        )
        .increment(1);
    }

    /// Record a job reaching `SUCCESS` or `FAILURE`
    pub fn record_job_finished(&self, job: &Job) {
        counter!(
            "batchsync_jobs_finished_total",
            "kind" => job.kind.as_str(),
            "status" => job.status.as_str()
        )
        .increment(1);

        if let Some(elapsed) = job.elapsed(job.end_time.unwrap_or(job.limit_time)) {
            histogram!("batchsync_job_duration_seconds", "kind" => job.kind.as_str())
                .record(elapsed.num_seconds() as f64);
        }
    }

    /// Record a forced `ABORT` from the timeout sweep
    pub fn record_job_aborted(&self, kind: JobKind) {
        counter!("batchsync_jobs_aborted_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a rejected transition caused by a concurrent writer
    pub fn record_transition_conflict(&self, action: &str) {
        self.transition_conflicts_total.increment(1);
        debug!(action = action, "Job transition conflict recorded");
    }

    pub fn record_occurrences_suppressed(&self, count: usize) {
        self.occurrences_suppressed_total.increment(count as u64);
    }

    /// Record the duration of one scheduling pass
    pub fn record_schedule_pass(&self, duration_seconds: f64) {
        self.schedule_pass_duration.record(duration_seconds);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
