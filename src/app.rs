use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use batchsync_config::AppConfig;
use batchsync_dispatcher::{
    JobLifecycleService, JobScheduler, PeriodicTask, ScheduleResolver, SchedulerConfig,
    SchedulingLoop, TimeoutSweeper,
};
use batchsync_domain::{
    Clock, Job, JobCreationRequest, JobDefinition, ScheduleDefinition, SystemClock, TimeWindow,
};
use batchsync_infrastructure::{init_metrics, DatabaseManager, MetricsCollector, Repositories};

use crate::document::Definitions;

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub jobdefs_created: usize,
    pub jobdefs_revised: usize,
    pub schedefs_created: usize,
    pub schedefs_revised: usize,
}

/// 预览中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewEntry {
    pub instant: DateTime<Utc>,
    pub schedef_id: String,
    pub jobdef_id: String,
    pub priority: char,
}

/// 应用程序
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        info!("连接数据库: {}", config.database.url);
        let database = DatabaseManager::new(&config.database.url, config.database.max_connections)
            .await
            .context("连接数据库失败")?;

        Ok(Self {
            config,
            database,
            clock,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn repositories(&self) -> Repositories {
        self.database.repositories()
    }

    /// 运行调度循环直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.observability.metrics_enabled {
            init_metrics(&self.config.observability.metrics_bind_address)?;
        }

        if !self.config.scheduler.enabled {
            warn!("调度已在配置中禁用，等待关闭信号");
            let _ = shutdown_rx.recv().await;
            return Ok(());
        }

        self.scheduling_loop()?.run(shutdown_rx).await;
        info!("调度循环已停止");
        Ok(())
    }

    pub fn scheduling_loop(&self) -> Result<SchedulingLoop> {
        let settings = &self.config.scheduler;
        let scheduler_config = SchedulerConfig {
            lookahead: chrono::Duration::from_std(settings.lookahead())
                .context("scheduler.lookahead_seconds 超出范围")?,
            lookback: chrono::Duration::from_std(settings.lookback())
                .context("scheduler.lookback_seconds 超出范围")?,
        };
        let repositories = self.repositories();

        let scheduler: Arc<dyn PeriodicTask> = Arc::new(JobScheduler::new(
            repositories.clone(),
            self.clock.clone(),
            self.metrics.clone(),
            scheduler_config,
        ));
        let mut scheduling_loop =
            SchedulingLoop::new(settings.poll_interval()).with_task(scheduler);

        if settings.timeout_sweep_enabled {
            let sweeper: Arc<dyn PeriodicTask> = Arc::new(TimeoutSweeper::new(
                repositories.jobs,
                self.clock.clone(),
                self.metrics.clone(),
            ));
            scheduling_loop = scheduling_loop.with_task(sweeper);
        }
        Ok(scheduling_loop)
    }

    /// 导入定义：新 id 直接登记，已有 id 生成下一个版本
    pub async fn import(&self, definitions: &Definitions, by: &str) -> Result<ImportSummary> {
        let repositories = self.repositories();
        let now = self.clock.now();
        let mut summary = ImportSummary::default();

        for jobdef in &definitions.jobdefs {
            match repositories.jobdefs.find_by_id(&jobdef.id).await? {
                Some(stored) => {
                    let next = stored.revise(by, now, |d| replace_jobdef(d, jobdef))?;
                    repositories.jobdefs.save(&next, Some(stored.version)).await?;
                    summary.jobdefs_revised += 1;
                }
                None => {
                    repositories.jobdefs.save(jobdef, None).await?;
                    summary.jobdefs_created += 1;
                }
            }
        }

        for schedef in &definitions.schedefs {
            if repositories.jobdefs.find_by_id(&schedef.jobdef_id).await?.is_none() {
                warn!(
                    schedef.id = %schedef.id,
                    jobdef.id = %schedef.jobdef_id,
                    "调度定义引用的作业定义不存在，触发时将被跳过"
                );
            }
            match repositories.schedefs.find_by_id(&schedef.id).await? {
                Some(stored) => {
                    let next = stored.revise(by, now, |d| replace_schedef(d, schedef))?;
                    repositories.schedefs.save(&next, Some(stored.version)).await?;
                    summary.schedefs_revised += 1;
                }
                None => {
                    repositories.schedefs.save(schedef, None).await?;
                    summary.schedefs_created += 1;
                }
            }
        }

        info!(
            jobdefs.created = summary.jobdefs_created,
            jobdefs.revised = summary.jobdefs_revised,
            schedefs.created = summary.schedefs_created,
            schedefs.revised = summary.schedefs_revised,
            "定义导入完成"
        );
        Ok(summary)
    }

    /// 手工提交作业
    pub async fn submit(&self, request: &JobCreationRequest) -> Result<Job> {
        let service =
            JobLifecycleService::new(self.repositories(), self.clock.clone(), self.metrics.clone());
        Ok(service.request_job(request).await?)
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}

/// 预览窗口内的触发时刻，不访问存储
pub fn preview(schedefs: &[ScheduleDefinition], window: &TimeWindow) -> Vec<PreviewEntry> {
    ScheduleResolver::resolve(schedefs, window)
        .into_iter()
        .map(|occurrence| PreviewEntry {
            instant: occurrence.instant,
            schedef_id: occurrence.schedef.id.clone(),
            jobdef_id: occurrence.schedef.jobdef_id.clone(),
            priority: occurrence.schedef.priority.as_char(),
        })
        .collect()
}

fn replace_jobdef(target: &mut JobDefinition, incoming: &JobDefinition) {
    *target = JobDefinition {
        audit: target.audit.clone(),
        ..incoming.clone()
    };
}

fn replace_schedef(target: &mut ScheduleDefinition, incoming: &ScheduleDefinition) {
    *target = ScheduleDefinition {
        audit: target.audit.clone(),
        ..incoming.clone()
    };
}
