use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::module::proving_job::error::DatabaseError;
use crate::module::proving_job::model::{ProvingJob, ProvingJobId, ProvingJobResult};

/// Durable storage the broker recovers its state from after a restart.
/// Writes must fail atomically: on error nothing may have been stored.
#[allow(async_fn_in_trait)]
pub trait ProvingJobDatabase: Send + Sync {
    async fn add_proving_job(&self, job: &ProvingJob) -> Result<(), DatabaseError>;

    async fn get_proving_job(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJob>, DatabaseError>;

    async fn all_proving_jobs(
        &self,
    ) -> Result<Vec<(ProvingJob, Option<ProvingJobResult>)>, DatabaseError>;

    async fn set_proving_job_result(
        &self,
        id: &ProvingJobId,
        result: ProvingJobResult,
    ) -> Result<(), DatabaseError>;

    async fn get_proving_job_result(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJobResult>, DatabaseError>;

    /// Removes the job definition and any stored terminal outcome.
    async fn delete_proving_job(&self, id: &ProvingJobId) -> Result<(), DatabaseError>;
}

impl<D: ProvingJobDatabase> ProvingJobDatabase for Arc<D> {
    async fn add_proving_job(&self, job: &ProvingJob) -> Result<(), DatabaseError> {
        (**self).add_proving_job(job).await
    }

    async fn get_proving_job(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJob>, DatabaseError> {
        (**self).get_proving_job(id).await
    }

    async fn all_proving_jobs(
        &self,
    ) -> Result<Vec<(ProvingJob, Option<ProvingJobResult>)>, DatabaseError> {
        (**self).all_proving_jobs().await
    }

    async fn set_proving_job_result(
        &self,
        id: &ProvingJobId,
        result: ProvingJobResult,
    ) -> Result<(), DatabaseError> {
        (**self).set_proving_job_result(id, result).await
    }

    async fn get_proving_job_result(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJobResult>, DatabaseError> {
        (**self).get_proving_job_result(id).await
    }

    async fn delete_proving_job(&self, id: &ProvingJobId) -> Result<(), DatabaseError> {
        (**self).delete_proving_job(id).await
    }
}

/// Reference implementation backing tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    inner: Mutex<InMemoryInner>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    jobs: HashMap<ProvingJobId, ProvingJob>,
    results: HashMap<ProvingJobId, ProvingJobResult>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InMemoryInner>, DatabaseError> {
        self.inner
            .lock()
            .map_err(|_| DatabaseError::Storage("job store lock poisoned".to_string()))
    }
}

impl ProvingJobDatabase for InMemoryDatabase {
    async fn add_proving_job(&self, job: &ProvingJob) -> Result<(), DatabaseError> {
        let mut inner = self.lock()?;
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_proving_job(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJob>, DatabaseError> {
        let inner = self.lock()?;
        Ok(inner.jobs.get(id).cloned())
    }

    async fn all_proving_jobs(
        &self,
    ) -> Result<Vec<(ProvingJob, Option<ProvingJobResult>)>, DatabaseError> {
        let inner = self.lock()?;
        Ok(inner
            .jobs
            .values()
            .map(|job| (job.clone(), inner.results.get(&job.id).cloned()))
            .collect())
    }

    async fn set_proving_job_result(
        &self,
        id: &ProvingJobId,
        result: ProvingJobResult,
    ) -> Result<(), DatabaseError> {
        let mut inner = self.lock()?;
        if !inner.jobs.contains_key(id) {
            return Err(DatabaseError::UnknownJob(id.clone()));
        }
        inner.results.insert(id.clone(), result);
        Ok(())
    }

    async fn get_proving_job_result(
        &self,
        id: &ProvingJobId,
    ) -> Result<Option<ProvingJobResult>, DatabaseError> {
        let inner = self.lock()?;
        Ok(inner.results.get(id).cloned())
    }

    async fn delete_proving_job(&self, id: &ProvingJobId) -> Result<(), DatabaseError> {
        let mut inner = self.lock()?;
        inner.jobs.remove(id);
        inner.results.remove(id);
        Ok(())
    }
}
