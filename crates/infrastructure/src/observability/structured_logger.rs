//! Structured logging utilities
//!
//! Event-tagged log records for job lifecycle and scheduling events. Every record carries an
//! `event` field so log pipelines can filter without parsing messages.

use batchsync_domain::{Job, JobStatus, TimeWindow};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log job creation
    pub fn log_job_created(job: &Job) {
        info!(
            event = "job_created",
            job.id = %job.id,
            job.kind = %job.kind,
            job.target = %job.target,
            job.jobdef_id = %job.jobdef_id,
            job.schedef_id = job.schedef_id.as_deref().unwrap_or("-"),
            job.schedule_time = %job.schedule_time,
            job.limit_time = %job.limit_time,
            "Job created"
        );
    }

    /// Log job start (`SCHEDULE → RUNNING`)
    pub fn log_job_started(job: &Job) {
        info!(
            event = "job_started",
            job.id = %job.id,
            job.kind = %job.kind,
            job.version = job.version,
            "Job started"
        );
    }

    /// Log job completion
    pub fn log_job_finished(job: &Job) {
        let messages = job.result_messages.as_deref().unwrap_or_default();
        if job.status == JobStatus::Success {
            info!(
                event = "job_finished",
                job.id = %job.id,
                job.status = %job.status,
                job.messages = ?messages,
                "Job finished"
            );
        } else {
            error!(
                event = "job_finished",
                job.id = %job.id,
                job.status = %job.status,
                job.messages = ?messages,
                "Job finished with failure"
            );
        }
    }

    /// Log forced abort after the limit time
    pub fn log_job_aborted(job: &Job, now: DateTime<Utc>) {
        warn!(
            event = "job_aborted",
            job.id = %job.id,
            job.kind = %job.kind,
            job.limit_time = %job.limit_time,
            aborted_at = %now,
            "Job aborted after limit time"
        );
    }

    /// Log an occurrence dropped by a cancel window
    pub fn log_occurrence_suppressed(schedef_id: &str, instant: DateTime<Utc>) {
        debug!(
            event = "occurrence_suppressed",
            schedef.id = schedef_id,
            occurrence = %instant,
            "Occurrence suppressed by cancel window"
        );
    }

    /// Log an occurrence that could not become a job
    pub fn log_occurrence_skipped(schedef_id: &str, instant: DateTime<Utc>, reason: &str) {
        warn!(
            event = "occurrence_skipped",
            schedef.id = schedef_id,
            occurrence = %instant,
            reason = reason,
            "Occurrence skipped"
        );
    }

    /// Log a transition rejected because of a concurrent writer or ineligible state
    pub fn log_transition_conflict(job_id: &str, action: &str, reason: &str) {
        warn!(
            event = "transition_conflict",
            job.id = job_id,
            action = action,
            reason = reason,
            "Job transition rejected"
        );
    }

    /// Log the summary of one scheduling pass
    pub fn log_schedule_pass_complete(
        window: &TimeWindow,
        resolved: usize,
        created: usize,
        skipped: usize,
        duration_ms: u64,
    ) {
        info!(
            event = "schedule_pass_complete",
            window.from = %window.from,
            window.to = %window.to,
            occurrences.resolved = resolved,
            jobs.created = created,
            occurrences.skipped = skipped,
            duration_ms = duration_ms,
            "Scheduling pass completed"
        );
    }

    /// Log the summary of one timeout sweep
    pub fn log_timeout_sweep_complete(overdue: usize, aborted: usize, conflicts: usize) {
        if overdue == 0 {
            debug!(event = "timeout_sweep_complete", "No overdue jobs");
        } else {
            info!(
                event = "timeout_sweep_complete",
                jobs.overdue = overdue,
                jobs.aborted = aborted,
                jobs.conflicts = conflicts,
                "Timeout sweep completed"
            );
        }
    }
}
