use std::sync::Arc;

use batchsync_domain::{JobDefinitionRepository, JobRepository, ScheduleDefinitionRepository};
use batchsync_errors::{SchedulerError, SchedulerResult};
use tracing::info;

use super::sqlite::{
    self, SqliteJobDefinitionRepository, SqliteJobRepository, SqliteScheduleDefinitionRepository,
};
use crate::memory::{
    InMemoryJobDefinitionRepository, InMemoryJobRepository, InMemoryScheduleDefinitionRepository,
};

/// Database type detection from the configured URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Memory,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> SchedulerResult<Self> {
        if url.starts_with("memory:") {
            Ok(DatabaseType::Memory)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else {
            Err(SchedulerError::config_error(format!(
                "不支持的数据库连接串: {url}"
            )))
        }
    }
}

/// The three repository ports behind one handle
#[derive(Clone)]
pub struct Repositories {
    pub schedefs: Arc<dyn ScheduleDefinitionRepository>,
    pub jobdefs: Arc<dyn JobDefinitionRepository>,
    pub jobs: Arc<dyn JobRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            schedefs: Arc::new(InMemoryScheduleDefinitionRepository::new()),
            jobdefs: Arc::new(InMemoryJobDefinitionRepository::new()),
            jobs: Arc::new(InMemoryJobRepository::new()),
        }
    }

    pub fn sqlite(pool: sqlx::SqlitePool) -> Self {
        Self {
            schedefs: Arc::new(SqliteScheduleDefinitionRepository::new(pool.clone())),
            jobdefs: Arc::new(SqliteJobDefinitionRepository::new(pool.clone())),
            jobs: Arc::new(SqliteJobRepository::new(pool)),
        }
    }
}

/// Database connection pool enum
pub enum DatabasePool {
    Memory,
    SQLite(sqlx::SqlitePool),
}

/// Unified database manager
pub struct DatabaseManager {
    pool: DatabasePool,
    repositories: Repositories,
}

impl DatabaseManager {
    /// Create new database manager with automatic type detection
    pub async fn new(url: &str, max_connections: u32) -> SchedulerResult<Self> {
        let manager = match DatabaseType::from_url(url)? {
            DatabaseType::Memory => Self {
                pool: DatabasePool::Memory,
                repositories: Repositories::in_memory(),
            },
            DatabaseType::SQLite => {
                let pool = sqlite::connect(url, max_connections).await?;
                Self {
                    repositories: Repositories::sqlite(pool.clone()),
                    pool: DatabasePool::SQLite(pool),
                }
            }
        };
        info!("数据库已就绪: {:?}", manager.database_type());
        Ok(manager)
    }

    pub fn database_type(&self) -> DatabaseType {
        match self.pool {
            DatabasePool::Memory => DatabaseType::Memory,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub fn repositories(&self) -> Repositories {
        self.repositories.clone()
    }

    pub async fn health_check(&self) -> SchedulerResult<()> {
        if let DatabasePool::SQLite(pool) = &self.pool {
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map_err(|e| SchedulerError::database_error(format!("数据库健康检查失败: {e}")))?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let DatabasePool::SQLite(pool) = &self.pool {
            pool.close().await;
        }
    }
}
