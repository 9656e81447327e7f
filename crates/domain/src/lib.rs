//! # 同步调度领域模型
//!
//! 触发规则、调度定义、作业定义、作业实例及其状态机，以及作业创建工厂和作业选项视图。
//! 本 crate 只包含纯数据与纯函数，持久化通过 [`repositories`] 中的端口抽象完成。

pub mod clock;
pub mod factory;
pub mod filter;
pub mod job;
pub mod jobdef;
pub mod options;
pub mod repositories;
pub mod request;
pub mod schedule;
pub mod time;
pub mod trigger;
pub mod validation;
pub mod validity;

pub use batchsync_errors::{SchedulerError, SchedulerResult, Violation};
pub use clock::{Clock, ManualClock, SystemClock};
pub use factory::JobFactory;
pub use filter::FilterCondition;
pub use job::{Job, JobOutcome, JobStatus};
pub use jobdef::{ContentKind, JobDefinition, JobKind, MAX_JOB_TIMEOUT_SECONDS};
pub use options::JobOptions;
pub use repositories::{JobDefinitionRepository, JobRepository, ScheduleDefinitionRepository};
pub use request::JobCreationRequest;
pub use schedule::{Audit, Priority, ScheduleDefinition};
pub use time::{iso_duration, TimeWindow};
pub use trigger::{
    CancelTrigger, DayOfWeek, DaysTrigger, OnceTrigger, TriggerKind, TriggerRule,
    WeekdaysTrigger,
};
pub use validation::{ensure_valid, validate, Validate};
pub use validity::ValidityPeriod;
