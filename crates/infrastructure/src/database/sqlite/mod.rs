pub mod sqlite_definition_repository;
pub mod sqlite_job_repository;

pub use sqlite_definition_repository::{
    SqliteJobDefinitionRepository, SqliteScheduleDefinitionRepository,
};
pub use sqlite_job_repository::SqliteJobRepository;

use std::str::FromStr;
use std::time::Duration;

use batchsync_errors::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

/// 索引列中的时间保存为 Unix 秒，整数比较即时间先后
pub(crate) fn epoch_seconds(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

/// 打开连接池并执行建表迁移
pub async fn connect(url: &str, max_connections: u32) -> SchedulerResult<SqlitePool> {
    debug!("Connecting SQLite database at: {}", url);

    let connect_options = SqliteConnectOptions::from_str(url)
        .map_err(|e| SchedulerError::config_error(format!("无效的SQLite连接串 {url}: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await
        .map_err(|e| SchedulerError::database_error(format!("连接SQLite数据库失败: {e}")))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// 运行数据库迁移
///
/// 每条记录以 JSON 形式保存在 `body` 列，查询和约束需要的字段另存为索引列。
pub async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
    debug!("Running SQLite database migrations");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS job_definitions (
            id TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS schedule_definitions (
            id TEXT PRIMARY KEY,
            jobdef_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            jobdef_id TEXT NOT NULL,
            schedef_id TEXT,
            schedule_time INTEGER NOT NULL,
            limit_time INTEGER NOT NULL,
            version INTEGER NOT NULL,
            body TEXT NOT NULL
        )
        "#,
        // 同一调度定义的同一触发时刻只能生成一个作业
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_occurrence ON jobs(schedef_id, schedule_time) WHERE schedef_id IS NOT NULL",
        "CREATE INDEX IF NOT EXISTS idx_jobs_status_limit_time ON jobs(status, limit_time)",
        "CREATE INDEX IF NOT EXISTS idx_schedule_definitions_jobdef_id ON schedule_definitions(jobdef_id)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| SchedulerError::database_error(format!("SQLite迁移失败: {e}")))?;
    }

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}
