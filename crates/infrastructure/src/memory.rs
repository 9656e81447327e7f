//! In-memory repositories
//!
//! Used by the `memory://` database URL, the `preview` command and tests. Semantics match the
//! SQLite repositories, including optimistic version checks and the occurrence uniqueness rule.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use batchsync_domain::{
    Job, JobDefinition, JobDefinitionRepository, JobRepository, JobStatus, ScheduleDefinition,
    ScheduleDefinitionRepository,
};
use batchsync_errors::SchedulerResult;

use crate::versioning::{occurrence_key, Entity};

#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleDefinitionRepository {
    schedefs: Arc<RwLock<HashMap<String, ScheduleDefinition>>>,
}

impl InMemoryScheduleDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleDefinitionRepository for InMemoryScheduleDefinitionRepository {
    async fn save(
        &self,
        schedef: &ScheduleDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<ScheduleDefinition> {
        let mut schedefs = self.schedefs.write().await;
        let stored = schedefs.get(&schedef.id).map(|s| s.version);
        Entity::ScheduleDefinition.check_save(&schedef.id, stored, expected_version)?;
        schedefs.insert(schedef.id.clone(), schedef.clone());
        Ok(schedef.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduleDefinition>> {
        Ok(self.schedefs.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<ScheduleDefinition>> {
        let mut all: Vec<_> = self.schedefs.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJobDefinitionRepository {
    jobdefs: Arc<RwLock<HashMap<String, JobDefinition>>>,
}

impl InMemoryJobDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobDefinitionRepository for InMemoryJobDefinitionRepository {
    async fn save(
        &self,
        jobdef: &JobDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<JobDefinition> {
        let mut jobdefs = self.jobdefs.write().await;
        let stored = jobdefs.get(&jobdef.id).map(|d| d.version);
        Entity::JobDefinition.check_save(&jobdef.id, stored, expected_version)?;
        jobdefs.insert(jobdef.id.clone(), jobdef.clone());
        Ok(jobdef.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<JobDefinition>> {
        Ok(self.jobdefs.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        let mut all: Vec<_> = self.jobdefs.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Jobs keyed by id, plus the `(schedef_id, schedule_time)` pairs already taken
#[derive(Debug, Default)]
struct JobStore {
    by_id: HashMap<String, Job>,
    occurrences: HashSet<(String, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJobRepository {
    store: Arc<RwLock<JobStore>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.store.read().await.by_id.len()
    }

    pub async fn all(&self) -> Vec<Job> {
        let mut all: Vec<_> = self.store.read().await.by_id.values().cloned().collect();
        all.sort_by(|a, b| (a.schedule_time, &a.id).cmp(&(b.schedule_time, &b.id)));
        all
    }

    async fn collect_sorted<F, K>(&self, keep: F, key: K) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
        K: Fn(&Job) -> DateTime<Utc>,
    {
        let mut jobs: Vec<_> = self
            .store
            .read()
            .await
            .by_id
            .values()
            .filter(|job| keep(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| (key(a), &a.id).cmp(&(key(b), &b.id)));
        jobs
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> SchedulerResult<Job> {
        let mut store = self.store.write().await;
        if store.by_id.contains_key(&job.id) {
            return Err(Entity::Job.already_exists(&job.id));
        }
        if let Some((schedef_id, schedule_time)) = job.idempotency_key() {
            if !store
                .occurrences
                .insert((schedef_id.to_string(), schedule_time))
            {
                return Err(Entity::Job.already_exists(&occurrence_key(
                    schedef_id,
                    schedule_time,
                )));
            }
        }
        store.by_id.insert(job.id.clone(), job.clone());
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<Job>> {
        Ok(self.store.read().await.by_id.get(id).cloned())
    }

    // schedef_id and schedule_time are fixed at create time
    async fn update(&self, job: &Job, expected_version: i64) -> SchedulerResult<Job> {
        let mut store = self.store.write().await;
        let stored = store
            .by_id
            .get(&job.id)
            .ok_or_else(|| Entity::Job.not_found(&job.id))?;
        if stored.version != expected_version {
            return Err(Entity::Job.conflict(&job.id, expected_version, stored.version));
        }
        store.by_id.insert(job.id.clone(), job.clone());
        Ok(job.clone())
    }

    async fn exists_for_occurrence(
        &self,
        schedef_id: &str,
        schedule_time: DateTime<Utc>,
    ) -> SchedulerResult<bool> {
        Ok(self
            .store
            .read()
            .await
            .occurrences
            .contains(&(schedef_id.to_string(), schedule_time)))
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<Job>> {
        Ok(self
            .collect_sorted(|job| job.is_overdue(now), |job| job.limit_time)
            .await)
    }

    async fn find_by_status(&self, status: JobStatus) -> SchedulerResult<Vec<Job>> {
        Ok(self
            .collect_sorted(|job| job.status == status, |job| job.schedule_time)
            .await)
    }
}
