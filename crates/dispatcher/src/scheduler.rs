use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use batchsync_domain::{Clock, Job, JobDefinition, JobFactory, TimeWindow};
use batchsync_errors::{SchedulerError, SchedulerResult};
use batchsync_infrastructure::{MetricsCollector, Repositories, StructuredLogger};

use crate::resolver::{ResolvedOccurrence, ScheduleResolver};

/// 调度扫描配置
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 从当前时刻向后展开的时长
    pub lookahead: Duration,
    /// 从当前时刻向前补建的时长
    pub lookback: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::hours(1),
            lookback: Duration::zero(),
        }
    }
}

impl SchedulerConfig {
    /// 扫描窗口 `[now - lookback, now + lookahead)`
    pub fn window_at(&self, now: DateTime<Utc>) -> TimeWindow {
        let from = now
            .checked_sub_signed(self.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let to = now
            .checked_add_signed(self.lookahead)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        TimeWindow::new(from, to)
    }
}

/// 一次调度扫描的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
    pub window: TimeWindow,
    pub resolved: usize,
    pub suppressed: usize,
    pub created: Vec<Job>,
    /// 幂等键已有作业的时刻
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ScheduleReport {
    fn new(window: TimeWindow) -> Self {
        Self {
            window,
            resolved: 0,
            suppressed: 0,
            created: Vec::new(),
            existing: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

enum Placement {
    Created(Job),
    Existing,
    Skipped(String),
}

/// 调度扫描：把窗口内的触发时刻落地为 `SCHEDULE` 状态的作业
pub struct JobScheduler {
    repositories: Repositories,
    factory: JobFactory,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        repositories: Repositories,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repositories,
            factory: JobFactory::new(clock.clone()),
            clock,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn scan_and_schedule(&self) -> SchedulerResult<ScheduleReport> {
        let window = self.config.window_at(self.clock.now());
        self.schedule_window(&window).await
    }

    /// 对给定窗口执行一次扫描
    ///
    /// 单个时刻的失败只记录日志并计数，不中断本次扫描；读取调度定义失败时返回错误。
    #[instrument(skip_all, fields(window.from = %window.from, window.to = %window.to))]
    pub async fn schedule_window(&self, window: &TimeWindow) -> SchedulerResult<ScheduleReport> {
        let started = Instant::now();
        info!("开始扫描调度定义");

        let schedefs = self.repositories.schedefs.find_all().await?;
        let resolution = ScheduleResolver::resolve_detailed(&schedefs, window);

        for occurrence in &resolution.suppressed {
            StructuredLogger::log_occurrence_suppressed(&occurrence.schedef.id, occurrence.instant);
        }
        self.metrics
            .record_occurrences_suppressed(resolution.suppressed.len());

        let mut report = ScheduleReport::new(*window);
        report.resolved = resolution.occurrences.len();
        report.suppressed = resolution.suppressed.len();

        let mut jobdefs = HashMap::new();
        for occurrence in &resolution.occurrences {
            match self.place(occurrence, &mut jobdefs).await {
                Ok(Placement::Created(job)) => {
                    StructuredLogger::log_job_created(&job);
                    self.metrics.record_job_created(job.kind, true);
                    report.created.push(job);
                }
                Ok(Placement::Existing) => report.existing += 1,
                Ok(Placement::Skipped(reason)) => {
                    StructuredLogger::log_occurrence_skipped(
                        &occurrence.schedef.id,
                        occurrence.instant,
                        &reason,
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(
                        schedef.id = %occurrence.schedef.id,
                        occurrence = %occurrence.instant,
                        error = %e,
                        "生成作业失败"
                    );
                    report.failed += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics.record_schedule_pass(elapsed.as_secs_f64());
        StructuredLogger::log_schedule_pass_complete(
            window,
            report.resolved,
            report.created.len(),
            report.skipped,
            elapsed.as_millis() as u64,
        );
        Ok(report)
    }

    async fn place(
        &self,
        occurrence: &ResolvedOccurrence<'_>,
        jobdefs: &mut HashMap<String, Option<JobDefinition>>,
    ) -> SchedulerResult<Placement> {
        let schedef = occurrence.schedef;
        if self
            .repositories
            .jobs
            .exists_for_occurrence(&schedef.id, occurrence.instant)
            .await?
        {
            return Ok(Placement::Existing);
        }

        if !jobdefs.contains_key(&schedef.jobdef_id) {
            let loaded = self
                .repositories
                .jobdefs
                .find_by_id(&schedef.jobdef_id)
                .await?;
            jobdefs.insert(schedef.jobdef_id.clone(), loaded);
        }
        let Some(jobdef) = jobdefs.get(&schedef.jobdef_id).and_then(Option::as_ref) else {
            return Ok(Placement::Skipped(format!(
                "作业定义 {} 不存在",
                schedef.jobdef_id
            )));
        };
        if !jobdef.is_effective_at(occurrence.instant) {
            return Ok(Placement::Skipped(format!(
                "作业定义 {} 在该时刻不在有效期内",
                jobdef.id
            )));
        }

        let job = match self
            .factory
            .create_scheduled(jobdef, schedef, occurrence.instant)
        {
            Ok(job) => job,
            Err(e) if e.is_validation() => return Ok(Placement::Skipped(e.to_string())),
            Err(e) => return Err(e),
        };

        match self.repositories.jobs.create(&job).await {
            Ok(job) => Ok(Placement::Created(job)),
            // 并发扫描已先一步写入同一幂等键
            Err(SchedulerError::AlreadyExists { .. }) => Ok(Placement::Existing),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchsync_domain::{JobStatus, ManualClock, ValidityPeriod};
    use batchsync_testing_utils::{utc, JobDefinitionBuilder, ScheduleDefinitionBuilder};

    struct Fixture {
        repositories: Repositories,
        clock: ManualClock,
        scheduler: JobScheduler,
    }

    fn fixture(config: SchedulerConfig) -> Fixture {
        let repositories = Repositories::in_memory();
        let clock = ManualClock::new(utc(2024, 1, 1, 6, 30, 0));
        let scheduler = JobScheduler::new(
            repositories.clone(),
            Arc::new(clock.clone()),
            Arc::new(MetricsCollector::new()),
            config,
        );
        Fixture {
            repositories,
            clock,
            scheduler,
        }
    }

    #[test]
    fn test_window_at() {
        let config = SchedulerConfig {
            lookahead: Duration::hours(2),
            lookback: Duration::minutes(30),
        };
        let now = utc(2024, 1, 1, 12, 0, 0);
        assert_eq!(
            config.window_at(now),
            TimeWindow::new(utc(2024, 1, 1, 11, 30, 0), utc(2024, 1, 1, 14, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_scan_creates_jobs_once() {
        let f = fixture(SchedulerConfig::default());
        let jobdef = JobDefinitionBuilder::new("import-users").build();
        let schedef = ScheduleDefinitionBuilder::new("daily", "import-users").build();
        f.repositories.jobdefs.save(&jobdef, None).await.unwrap();
        f.repositories.schedefs.save(&schedef, None).await.unwrap();

        let report = f.scheduler.scan_and_schedule().await.unwrap();
        assert_eq!(report.resolved, 1);
        assert_eq!(report.created.len(), 1);

        let job = &report.created[0];
        assert_eq!(job.status, JobStatus::Schedule);
        assert_eq!(job.schedule_time, utc(2024, 1, 1, 7, 0, 0));
        assert_eq!(job.limit_time, utc(2024, 1, 1, 8, 0, 0));
        assert_eq!(job.schedef_id.as_deref(), Some("daily"));

        let again = f.scheduler.scan_and_schedule().await.unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.existing, 1);

        f.clock.advance(Duration::days(1));
        let next_day = f.scheduler.scan_and_schedule().await.unwrap();
        assert_eq!(next_day.created.len(), 1);
        assert_eq!(
            f.repositories
                .jobs
                .find_by_status(JobStatus::Schedule)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_scan_skips_missing_or_invalid_jobdef() {
        let f = fixture(SchedulerConfig::default());
        let expired = JobDefinitionBuilder::new("expired")
            .with_validity(ValidityPeriod::new(
                utc(2023, 1, 1, 0, 0, 0),
                utc(2023, 12, 31, 0, 0, 0),
            ))
            .build();
        f.repositories.jobdefs.save(&expired, None).await.unwrap();
        f.repositories
            .schedefs
            .save(&ScheduleDefinitionBuilder::new("orphan", "missing").build(), None)
            .await
            .unwrap();
        f.repositories
            .schedefs
            .save(&ScheduleDefinitionBuilder::new("stale", "expired").build(), None)
            .await
            .unwrap();

        let report = f.scheduler.scan_and_schedule().await.unwrap();
        assert_eq!(report.resolved, 2);
        assert_eq!(report.skipped, 2);
        assert!(report.created.is_empty());
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_scan_honours_cancel_and_lookback() {
        let f = fixture(SchedulerConfig {
            lookahead: Duration::hours(1),
            lookback: Duration::days(2),
        });
        let jobdef = JobDefinitionBuilder::new("import-users").build();
        f.repositories.jobdefs.save(&jobdef, None).await.unwrap();
        f.repositories
            .schedefs
            .save(&ScheduleDefinitionBuilder::new("daily", "import-users").build(), None)
            .await
            .unwrap();
        f.repositories
            .schedefs
            .save(
                &ScheduleDefinitionBuilder::new("holiday", "import-users")
                    .cancel(utc(2023, 12, 31, 0, 0, 0), Duration::days(1))
                    .build(),
                None,
            )
            .await
            .unwrap();

        // 窗口 [2023-12-30T06:30, 2024-01-01T07:30)：12-30、12-31、01-01 三个时刻，12-31 被屏蔽
        let report = f.scheduler.scan_and_schedule().await.unwrap();
        assert_eq!(report.suppressed, 1);
        let times: Vec<_> = report.created.iter().map(|job| job.schedule_time).collect();
        assert_eq!(
            times,
            vec![utc(2023, 12, 30, 7, 0, 0), utc(2024, 1, 1, 7, 0, 0)]
        );
    }
}
