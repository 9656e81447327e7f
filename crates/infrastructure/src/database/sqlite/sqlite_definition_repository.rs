use async_trait::async_trait;
use batchsync_domain::{
    JobDefinition, JobDefinitionRepository, ScheduleDefinition, ScheduleDefinitionRepository,
};
use batchsync_errors::SchedulerResult;
use serde::de::DeserializeOwned;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::epoch_seconds;
use crate::error_handling::{map_sqlx_error, RepositoryOperation};
use crate::versioning::Entity;

async fn stored_version(
    pool: &SqlitePool,
    table: &str,
    entity: Entity,
    id: &str,
) -> SchedulerResult<Option<i64>> {
    let sql = format!("SELECT version FROM {table} WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_sqlx_error(RepositoryOperation::Read, entity, id, e))?;
    row.map(|row| row.try_get::<i64, _>("version"))
        .transpose()
        .map_err(|e| map_sqlx_error(RepositoryOperation::Read, entity, id, e))
}

/// 更新影响 0 行时区分"不存在"与"版本冲突"
async fn explain_missed_update(
    pool: &SqlitePool,
    table: &str,
    entity: Entity,
    id: &str,
    expected: i64,
) -> SchedulerResult<()> {
    match stored_version(pool, table, entity, id).await? {
        None => Err(entity.not_found(id)),
        Some(actual) => Err(entity.conflict(id, expected, actual)),
    }
}

async fn find_body<T: DeserializeOwned>(
    pool: &SqlitePool,
    table: &str,
    entity: Entity,
    id: &str,
) -> SchedulerResult<Option<T>> {
    let sql = format!("SELECT body FROM {table} WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_sqlx_error(RepositoryOperation::Read, entity, id, e))?;
    match row {
        Some(row) => {
            let body: String = row
                .try_get("body")
                .map_err(|e| map_sqlx_error(RepositoryOperation::Read, entity, id, e))?;
            Ok(Some(serde_json::from_str(&body)?))
        }
        None => Ok(None),
    }
}

async fn find_all_bodies<T: DeserializeOwned>(
    pool: &SqlitePool,
    table: &str,
    entity: Entity,
) -> SchedulerResult<Vec<T>> {
    let sql = format!("SELECT body FROM {table} ORDER BY id");
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error(RepositoryOperation::Query, entity, "*", e))?;
    rows.iter()
        .map(|row| {
            let body: String = row
                .try_get("body")
                .map_err(|e| map_sqlx_error(RepositoryOperation::Query, entity, "*", e))?;
            Ok(serde_json::from_str(&body)?)
        })
        .collect()
}

pub struct SqliteScheduleDefinitionRepository {
    pool: SqlitePool,
}

impl SqliteScheduleDefinitionRepository {
    const TABLE: &'static str = "schedule_definitions";

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleDefinitionRepository for SqliteScheduleDefinitionRepository {
    #[instrument(skip(self, schedef), fields(schedef.id = %schedef.id, schedef.version = schedef.version))]
    async fn save(
        &self,
        schedef: &ScheduleDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<ScheduleDefinition> {
        let entity = Entity::ScheduleDefinition;
        let body = serde_json::to_string(schedef)?;
        let updated_at = epoch_seconds(schedef.audit.updated_at);

        match expected_version {
            None => {
                sqlx::query(
                    "INSERT INTO schedule_definitions (id, jobdef_id, version, body, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(&schedef.id)
                .bind(&schedef.jobdef_id)
                .bind(schedef.version)
                .bind(&body)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(RepositoryOperation::Create, entity, &schedef.id, e))?;
            }
            Some(expected) => {
                let result = sqlx::query(
                    "UPDATE schedule_definitions SET jobdef_id = ?2, version = ?3, body = ?4, updated_at = ?5 WHERE id = ?1 AND version = ?6",
                )
                .bind(&schedef.id)
                .bind(&schedef.jobdef_id)
                .bind(schedef.version)
                .bind(&body)
                .bind(updated_at)
                .bind(expected)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(RepositoryOperation::Update, entity, &schedef.id, e))?;
                if result.rows_affected() == 0 {
                    explain_missed_update(&self.pool, Self::TABLE, entity, &schedef.id, expected)
                        .await?;
                }
            }
        }

        debug!("保存调度定义成功: {} v{}", schedef.id, schedef.version);
        Ok(schedef.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduleDefinition>> {
        find_body(&self.pool, Self::TABLE, Entity::ScheduleDefinition, id).await
    }

    async fn find_all(&self) -> SchedulerResult<Vec<ScheduleDefinition>> {
        find_all_bodies(&self.pool, Self::TABLE, Entity::ScheduleDefinition).await
    }
}

pub struct SqliteJobDefinitionRepository {
    pool: SqlitePool,
}

impl SqliteJobDefinitionRepository {
    const TABLE: &'static str = "job_definitions";

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobDefinitionRepository for SqliteJobDefinitionRepository {
    #[instrument(skip(self, jobdef), fields(jobdef.id = %jobdef.id, jobdef.version = jobdef.version))]
    async fn save(
        &self,
        jobdef: &JobDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<JobDefinition> {
        let entity = Entity::JobDefinition;
        let body = serde_json::to_string(jobdef)?;
        let updated_at = epoch_seconds(jobdef.audit.updated_at);

        match expected_version {
            None => {
                sqlx::query(
                    "INSERT INTO job_definitions (id, version, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(&jobdef.id)
                .bind(jobdef.version)
                .bind(&body)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(RepositoryOperation::Create, entity, &jobdef.id, e))?;
            }
            Some(expected) => {
                let result = sqlx::query(
                    "UPDATE job_definitions SET version = ?2, body = ?3, updated_at = ?4 WHERE id = ?1 AND version = ?5",
                )
                .bind(&jobdef.id)
                .bind(jobdef.version)
                .bind(&body)
                .bind(updated_at)
                .bind(expected)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(RepositoryOperation::Update, entity, &jobdef.id, e))?;
                if result.rows_affected() == 0 {
                    explain_missed_update(&self.pool, Self::TABLE, entity, &jobdef.id, expected)
                        .await?;
                }
            }
        }

        debug!("保存作业定义成功: {} v{}", jobdef.id, jobdef.version);
        Ok(jobdef.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<JobDefinition>> {
        find_body(&self.pool, Self::TABLE, Entity::JobDefinition, id).await
    }

    async fn find_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        find_all_bodies(&self.pool, Self::TABLE, Entity::JobDefinition).await
    }
}
