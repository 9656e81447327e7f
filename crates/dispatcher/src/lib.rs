//! 调度器
//!
//! 触发时刻展开与解析、调度扫描、超时清扫、面向执行方的状态迁移服务，以及驱动它们的周期循环。

pub mod lifecycle;
pub mod occurrence;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod sweeper;

pub use lifecycle::JobLifecycleService;
pub use occurrence::{Generated, OccurrenceGenerator, Occurrences};
pub use resolver::{Resolution, ResolvedOccurrence, ScheduleResolver, SuppressionSet};
pub use runner::{PeriodicTask, SchedulingLoop};
pub use scheduler::{JobScheduler, ScheduleReport, SchedulerConfig};
pub use sweeper::{SweepReport, TimeoutSweeper};
