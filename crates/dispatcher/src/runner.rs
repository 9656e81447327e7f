use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use batchsync_errors::SchedulerResult;

use crate::scheduler::JobScheduler;
use crate::sweeper::TimeoutSweeper;

/// 每个周期执行一次的任务
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> SchedulerResult<()>;
}

#[async_trait]
impl PeriodicTask for JobScheduler {
    fn name(&self) -> &'static str {
        "schedule"
    }

    async fn run_once(&self) -> SchedulerResult<()> {
        self.scan_and_schedule().await.map(|_| ())
    }
}

#[async_trait]
impl PeriodicTask for TimeoutSweeper {
    fn name(&self) -> &'static str {
        "timeout_sweep"
    }

    async fn run_once(&self) -> SchedulerResult<()> {
        self.sweep().await.map(|_| ())
    }
}

/// 调度循环
///
/// 每个周期按注册顺序执行全部任务。单个任务失败只记录日志，循环继续；
/// 收到关闭信号后在当前周期结束时退出。
pub struct SchedulingLoop {
    tasks: Vec<Arc<dyn PeriodicTask>>,
    interval: Duration,
}

impl SchedulingLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            interval,
        }
    }

    pub fn with_task(mut self, task: Arc<dyn PeriodicTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub async fn tick(&self) {
        for task in &self.tasks {
            match task.run_once().await {
                Ok(()) => debug!(task = task.name(), "周期任务完成"),
                Err(e) => error!(task = task.name(), error = %e, "周期任务失败"),
            }
        }
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            tasks = self.tasks.len(),
            "调度循环启动"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown_rx.recv() => {
                    info!("调度循环收到关闭信号");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use batchsync_errors::SchedulerError;

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
        failing: bool,
    }

    #[async_trait]
    impl PeriodicTask for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self) -> SchedulerResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(SchedulerError::Internal("boom".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_tick_runs_every_task_even_after_failure() {
        let failing = Arc::new(Counting {
            failing: true,
            ..Counting::default()
        });
        let healthy = Arc::new(Counting::default());
        let scheduling_loop = SchedulingLoop::new(Duration::from_secs(60))
            .with_task(failing.clone())
            .with_task(healthy.clone());

        scheduling_loop.tick().await;
        scheduling_loop.tick().await;
        assert_eq!(failing.runs.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let task = Arc::new(Counting::default());
        let scheduling_loop =
            Arc::new(SchedulingLoop::new(Duration::from_millis(10)).with_task(task.clone()));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn({
            let scheduling_loop = scheduling_loop.clone();
            async move { scheduling_loop.run(shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(task.runs.load(Ordering::SeqCst) >= 1);
    }
}
