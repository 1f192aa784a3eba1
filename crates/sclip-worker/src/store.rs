//! Job record storage.
//!
//! One record per idempotency key. Create-or-get is atomic per key and admits
//! new records as `running`, so racing callers never see `queued`. Terminal
//! records are removed only by an explicit sweep under the injected
//! [`EvictionPolicy`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sclip_models::{IdempotencyKey, Job, ProcessingOptions};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Result of [`JobStore::create_or_get`].
#[derive(Debug, Clone)]
pub enum Admission {
    /// A new running record was created; the caller owns its execution.
    Created(Job),
    /// A record already existed for the key.
    Existing(Job),
}

impl Admission {
    pub fn job(&self) -> &Job {
        match self {
            Admission::Created(job) | Admission::Existing(job) => job,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Admission::Created(_))
    }
}

/// Storage for job records keyed by idempotency key.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Return the record for `key`, creating a running one if none exists.
    async fn create_or_get(
        &self,
        key: &IdempotencyKey,
        input_ref: &str,
        options: &ProcessingOptions,
    ) -> Admission;

    async fn get(&self, key: &IdempotencyKey) -> Option<Job>;

    /// Replace the stored record with `job`.
    async fn update(&self, job: &Job) -> WorkerResult<()>;

    /// Remove terminal records the eviction policy considers expired.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

/// Which terminal records may be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Age since `finished_at` after which a terminal record is removed
    pub max_age: Duration,
}

impl EvictionPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Never evict.
    pub fn keep_forever() -> Self {
        Self {
            max_age: Duration::MAX,
        }
    }

    pub fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
        if !job.status.is_terminal() {
            return false;
        }
        let Some(finished) = job.finished_at else {
            return false;
        };
        // Ages too large for chrono never expire.
        match chrono::Duration::from_std(self.max_age) {
            Ok(max_age) => now.signed_duration_since(finished) > max_age,
            Err(_) => false,
        }
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 3600))
    }
}

/// Process-local [`JobStore`].
#[derive(Debug, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<IdempotencyKey, Job>>>,
    policy: EvictionPolicy,
}

impl InMemoryJobStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_or_get(
        &self,
        key: &IdempotencyKey,
        input_ref: &str,
        options: &ProcessingOptions,
    ) -> Admission {
        {
            let jobs = self.jobs.read().await;
            if let Some(job) = jobs.get(key) {
                return Admission::Existing(job.clone());
            }
        }

        let mut jobs = self.jobs.write().await;
        // Double-check after acquiring write lock
        if let Some(job) = jobs.get(key) {
            return Admission::Existing(job.clone());
        }

        let job = Job::started(key.clone(), input_ref, options.clone());
        debug!(job_id = %job.id, key = %key, "Created job record");
        jobs.insert(key.clone(), job.clone());
        Admission::Created(job)
    }

    async fn get(&self, key: &IdempotencyKey) -> Option<Job> {
        self.jobs.read().await.get(key).cloned()
    }

    async fn update(&self, job: &Job) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.idempotency_key) {
            Some(slot) if slot.id == job.id => {
                *slot = job.clone();
                Ok(())
            }
            _ => Err(WorkerError::NotFound(job.idempotency_key.to_string())),
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !self.policy.is_expired(job, now));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, remaining = jobs.len(), "Evicted expired job records");
        }
        removed
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

/// Run [`JobStore::sweep_expired`] every `interval` until the task is aborted.
pub fn spawn_sweeper(store: Arc<dyn JobStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.sweep_expired(Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sclip_models::JobStatus;

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_get_existing() {
        let store = InMemoryJobStore::default();
        let options = ProcessingOptions::default();

        let first = store.create_or_get(&key("a"), "in.mp4", &options).await;
        assert!(first.is_created());
        assert_eq!(first.job().status, JobStatus::Running);
        assert!(first.job().started_at.is_some());

        let second = store.create_or_get(&key("a"), "other.mp4", &options).await;
        assert!(!second.is_created());
        assert_eq!(second.job().id, first.job().id);
        assert_eq!(second.job().input_ref, "in.mp4");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_create_single_winner() {
        let store = Arc::new(InMemoryJobStore::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create_or_get(&key("same"), "in.mp4", &ProcessingOptions::default())
                    .await
                    .is_created()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_job_fails() {
        let store = InMemoryJobStore::default();
        let job = Job::new(key("missing"), "in.mp4", ProcessingOptions::default());
        assert!(matches!(
            store.update(&job).await,
            Err(WorkerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_terminal_records() {
        let store = InMemoryJobStore::new(EvictionPolicy::new(Duration::from_secs(60)));
        let options = ProcessingOptions::default();

        let mut done = store
            .create_or_get(&key("done"), "a.mp4", &options)
            .await
            .job()
            .clone();
        done.complete(Vec::new()).unwrap();
        store.update(&done).await.unwrap();

        store.create_or_get(&key("running"), "b.mp4", &options).await;

        // Not old enough yet
        assert_eq!(store.sweep_expired(Utc::now()).await, 0);

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(store.sweep_expired(later).await, 1);
        assert!(store.get(&key("done")).await.is_none());
        assert!(store.get(&key("running")).await.is_some());
    }

    #[test]
    fn test_keep_forever_never_expires() {
        let mut job = Job::new(key("k"), "in.mp4", ProcessingOptions::default());
        job.start().unwrap();
        job.fail("boom").unwrap();
        let far = Utc::now() + chrono::Duration::days(3650);
        assert!(!EvictionPolicy::keep_forever().is_expired(&job, far));
    }
}
