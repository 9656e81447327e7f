use async_trait::async_trait;
use batchsync_domain::{Job, JobRepository, JobStatus};
use batchsync_errors::SchedulerResult;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::epoch_seconds;
use crate::error_handling::{map_sqlx_error, RepositoryOperation};
use crate::versioning::{occurrence_key, Entity};

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &SqliteRow) -> SchedulerResult<Job> {
        let body: String = row
            .try_get("body")
            .map_err(|e| map_sqlx_error(RepositoryOperation::Read, Entity::Job, "*", e))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_jobs<'q, T>(&self, sql: &'q str, param: T) -> SchedulerResult<Vec<Job>>
    where
        T: 'q + Send + sqlx::Encode<'q, Sqlite> + sqlx::Type<Sqlite>,
    {
        let rows = sqlx::query(sql)
            .bind(param)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(RepositoryOperation::Query, Entity::Job, "*", e))?;
        rows.iter().map(Self::row_to_job).collect()
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, job), fields(job.id = %job.id))]
    async fn create(&self, job: &Job) -> SchedulerResult<Job> {
        let body = serde_json::to_string(job)?;
        sqlx::query(
            r#"
            INSERT INTO jobs (id, status, jobdef_id, schedef_id, schedule_time, limit_time, version, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.as_str())
        .bind(&job.jobdef_id)
        .bind(job.schedef_id.as_deref())
        .bind(epoch_seconds(job.schedule_time))
        .bind(epoch_seconds(job.limit_time))
        .bind(job.version)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let id = match job.idempotency_key() {
                Some((schedef_id, schedule_time)) => occurrence_key(schedef_id, schedule_time),
                None => job.id.clone(),
            };
            map_sqlx_error(RepositoryOperation::Create, Entity::Job, &id, e)
        })?;

        debug!("创建作业成功: {} ({})", job.id, job.schedule_time);
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<Job>> {
        let row = sqlx::query("SELECT body FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(RepositoryOperation::Read, Entity::Job, id, e))?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    #[instrument(skip(self, job), fields(job.id = %job.id, job.status = %job.status))]
    async fn update(&self, job: &Job, expected_version: i64) -> SchedulerResult<Job> {
        let body = serde_json::to_string(job)?;
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?2, limit_time = ?3, version = ?4, body = ?5
            WHERE id = ?1 AND version = ?6
            "#,
        )
        .bind(&job.id)
        .bind(job.status.as_str())
        .bind(epoch_seconds(job.limit_time))
        .bind(job.version)
        .bind(&body)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(RepositoryOperation::Update, Entity::Job, &job.id, e))?;

        if result.rows_affected() == 0 {
            let row = sqlx::query("SELECT version FROM jobs WHERE id = ?1")
                .bind(&job.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(RepositoryOperation::Read, Entity::Job, &job.id, e))?;
            return match row {
                None => Err(Entity::Job.not_found(&job.id)),
                Some(row) => {
                    let actual: i64 = row.try_get("version").map_err(|e| {
                        map_sqlx_error(RepositoryOperation::Read, Entity::Job, &job.id, e)
                    })?;
                    Err(Entity::Job.conflict(&job.id, expected_version, actual))
                }
            };
        }

        Ok(job.clone())
    }

    async fn exists_for_occurrence(
        &self,
        schedef_id: &str,
        schedule_time: DateTime<Utc>,
    ) -> SchedulerResult<bool> {
        let row = sqlx::query("SELECT 1 FROM jobs WHERE schedef_id = ?1 AND schedule_time = ?2 LIMIT 1")
            .bind(schedef_id)
            .bind(epoch_seconds(schedule_time))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(RepositoryOperation::Read, Entity::Job, schedef_id, e))?;
        Ok(row.is_some())
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<Job>> {
        self.fetch_jobs(
            r#"
            SELECT body FROM jobs
            WHERE status IN ('SCHEDULE', 'RUNNING') AND limit_time <= ?1
            ORDER BY limit_time, id
            "#,
            epoch_seconds(now),
        )
        .await
    }

    async fn find_by_status(&self, status: JobStatus) -> SchedulerResult<Vec<Job>> {
        self.fetch_jobs(
            "SELECT body FROM jobs WHERE status = ?1 ORDER BY schedule_time, id",
            status.as_str().to_string(),
        )
        .await
    }
}
