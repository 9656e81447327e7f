use std::sync::Arc;

use serde::Serialize;
use tracing::{error, instrument};

use batchsync_domain::{Clock, Job, JobRepository};
use batchsync_errors::SchedulerResult;
use batchsync_infrastructure::{MetricsCollector, StructuredLogger};

/// 一次超时清扫的结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub overdue: usize,
    pub aborted: Vec<Job>,
    /// 与执行方并发写入而放弃的作业数
    pub conflicts: usize,
    pub failed: usize,
}

/// 超时清扫：把超过截止时间仍未结束的作业强制迁移到 `ABORT`
pub struct TimeoutSweeper {
    jobs: Arc<dyn JobRepository>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
}

impl TimeoutSweeper {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            jobs,
            clock,
            metrics,
        }
    }

    #[instrument(skip_all)]
    pub async fn sweep(&self) -> SchedulerResult<SweepReport> {
        let now = self.clock.now();
        let overdue = self.jobs.find_overdue(now).await?;
        let mut report = SweepReport {
            overdue: overdue.len(),
            ..SweepReport::default()
        };

        for mut job in overdue {
            let expected = job.version;
            let reason = format!("超过截止时间 {} 被强制中止", job.limit_time.to_rfc3339());
            let result = match job.abort(now, expected, Some(reason)) {
                Ok(()) => self.jobs.update(&job, expected).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(aborted) => {
                    StructuredLogger::log_job_aborted(&aborted, now);
                    self.metrics.record_job_aborted(aborted.kind);
                    report.aborted.push(aborted);
                }
                Err(e) if e.is_state_conflict() => {
                    StructuredLogger::log_transition_conflict(&job.id, "abort", &e.to_string());
                    self.metrics.record_transition_conflict("abort");
                    report.conflicts += 1;
                }
                Err(e) => {
                    error!(job.id = %job.id, error = %e, "中止超时作业失败");
                    report.failed += 1;
                }
            }
        }

        StructuredLogger::log_timeout_sweep_complete(
            report.overdue,
            report.aborted.len(),
            report.conflicts,
        );
        Ok(report)
    }
}
