use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::environment::BrokerConfig;
use crate::module::proving_job::error::BrokerError;
use crate::module::proving_job::model::{
    ClaimedJob, JobStatus, ProofType, ProvingJob, ProvingJobId, ProvingJobResult,
};
use crate::service::database_service::ProvingJobDatabase;
use crate::service::lease_service::LeaseTable;
use crate::service::queue_service::JobQueue;

/// Priority-aware work broker between a producer of proving jobs and a pool
/// of unreliable workers. All state transitions go through one mutex so a job
/// can never be handed to two workers while its lease is live, and the
/// timeout sweep can never requeue a job that is concurrently being resolved.
pub struct ProvingBroker<D> {
    database: D,
    config: BrokerConfig,
    state: Arc<Mutex<BrokerState>>,
    sweep: Mutex<Option<SweepTask>>,
}

struct SweepTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct BrokerState {
    started: bool,
    jobs: HashMap<ProvingJobId, ProvingJob>,
    results: HashMap<ProvingJobId, ProvingJobResult>,
    queue: JobQueue,
    leases: LeaseTable,
    retries: HashMap<ProvingJobId, u32>,
}

impl<D: ProvingJobDatabase> ProvingBroker<D> {
    pub fn new(database: D, config: BrokerConfig) -> Self {
        let state = BrokerState {
            started: false,
            jobs: HashMap::new(),
            results: HashMap::new(),
            queue: JobQueue::new(config.priorities.clone()),
            leases: LeaseTable::new(),
            retries: HashMap::new(),
        };
        Self {
            database,
            config,
            state: Arc::new(Mutex::new(state)),
            sweep: Mutex::new(None),
        }
    }

    /// Rebuilds in-memory state from the database and starts the timeout
    /// sweep. Jobs with a persisted result surface as resolved/rejected;
    /// every other persisted job goes back in the queue, leases and retry
    /// counters are never persisted and start empty.
    pub async fn start(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let persisted = self.database.all_proving_jobs().await?;

        state.jobs.clear();
        state.results.clear();
        state.retries.clear();
        state.leases = LeaseTable::new();
        state.queue = JobQueue::new(self.config.priorities.clone());

        for (job, result) in persisted {
            match result {
                Some(result) => {
                    state.results.insert(job.id.clone(), result);
                }
                None => state.queue.enqueue(&job),
            }
            state.jobs.insert(job.id.clone(), job);
        }
        state.started = true;
        info!(
            queued = state.queue.len(),
            finished = state.results.len(),
            "proving broker started"
        );
        drop(state);

        self.spawn_sweep().await;
        Ok(())
    }

    /// Halts the timeout sweep; producer and consumer calls fail with
    /// `NotStarted` until `start` is called again.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().await;
            state.started = false;
        }
        if let Some(task) = self.sweep.lock().await.take() {
            let _ = task.shutdown.send(true);
            let _ = task.handle.await;
        }
        info!("proving broker stopped");
    }

    pub async fn enqueue_proving_job(&self, job: ProvingJob) -> Result<(), BrokerError> {
        let mut state = self.lock_started().await?;
        if let Some(existing) = state.jobs.get(&job.id) {
            if *existing == job {
                debug!(job_id = %job.id, "job already enqueued, ignoring");
                return Ok(());
            }
            return Err(BrokerError::DuplicateJobId(job.id.clone()));
        }

        self.database.add_proving_job(&job).await?;
        info!(
            job_id = %job.id,
            block_number = job.block_number,
            "proving job enqueued"
        );
        state.queue.enqueue(&job);
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub async fn get_proving_job_status(
        &self,
        id: &ProvingJobId,
    ) -> Result<JobStatus, BrokerError> {
        let state = self.lock_started().await?;
        if let Some(result) = state.results.get(id) {
            return Ok(match result {
                ProvingJobResult::Success { value } => JobStatus::Resolved {
                    value: value.clone(),
                },
                ProvingJobResult::Error { error } => JobStatus::Rejected {
                    error: error.clone(),
                },
            });
        }
        if state.leases.contains(id) {
            return Ok(JobStatus::InProgress);
        }
        if state.jobs.contains_key(id) {
            return Ok(JobStatus::InQueue);
        }
        Ok(JobStatus::NotFound)
    }

    /// The only state-destroying operation: in-memory state is cleared
    /// unconditionally before the database delete so a cancelled job is gone
    /// even if the adapter cleanup fails.
    pub async fn remove_and_cancel_proving_job(
        &self,
        id: &ProvingJobId,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock_started().await?;
        info!(job_id = %id, "removing proving job");
        state.queue.remove(id);
        state.leases.remove(id);
        state.retries.remove(id);
        state.results.remove(id);
        state.jobs.remove(id);
        self.database.delete_proving_job(id).await?;
        Ok(())
    }

    pub async fn get_proving_job(
        &self,
        allow_list: &[ProofType],
    ) -> Result<Option<ClaimedJob>, BrokerError> {
        let mut state = self.lock_started().await?;
        Ok(self.claim_next(&mut state, allow_list))
    }

    /// Heartbeat. Extends the lease when the caller still owns the job; a
    /// caller that started no later than the recorded owner takes the lease
    /// over (covers two workers holding the same job after a broker restart).
    /// A caller that lost the job gets the next eligible one instead.
    pub async fn report_proving_job_progress(
        &self,
        id: &ProvingJobId,
        started_at: u64,
        allow_list: &[ProofType],
    ) -> Result<Option<ClaimedJob>, BrokerError> {
        let mut state = self.lock_started().await?;
        if !state.jobs.contains_key(id) || state.results.contains_key(id) {
            warn!(job_id = %id, "progress reported for unknown or finished job");
            return Ok(self.claim_next(&mut state, allow_list));
        }

        let expires_at = Instant::now() + self.config.job_timeout();
        let current = state.leases.get(id).map(|lease| lease.started_at);
        match current {
            None => {
                // job went back to the queue (restart or timeout); accept the
                // worker's claim instead of handing the job out twice
                state.queue.remove(id);
                state.leases.claim(id.clone(), started_at, expires_at);
                Ok(None)
            }
            Some(existing) if started_at == existing => {
                state.leases.refresh(id, expires_at);
                Ok(None)
            }
            Some(existing) if started_at < existing => {
                debug!(job_id = %id, started_at, "job taken over by earlier worker");
                state.leases.claim(id.clone(), started_at, expires_at);
                Ok(None)
            }
            Some(_) => {
                debug!(job_id = %id, started_at, "job is assigned to another worker");
                Ok(self.claim_next(&mut state, allow_list))
            }
        }
    }

    pub async fn report_proving_job_success(
        &self,
        id: &ProvingJobId,
        value: Value,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock_started().await?;
        if !state.jobs.contains_key(id) {
            debug!(job_id = %id, "success reported for unknown job, ignoring");
            return Ok(());
        }

        self.database
            .set_proving_job_result(
                id,
                ProvingJobResult::Success {
                    value: value.clone(),
                },
            )
            .await?;
        info!(job_id = %id, "proving job resolved");
        state.leases.remove(id);
        state.queue.remove(id);
        state.retries.remove(id);
        state
            .results
            .insert(id.clone(), ProvingJobResult::Success { value });
        Ok(())
    }

    pub async fn report_proving_job_error(
        &self,
        id: &ProvingJobId,
        error: impl Into<String>,
        retry: bool,
    ) -> Result<(), BrokerError> {
        let error = error.into();
        let mut state = self.lock_started().await?;
        if !state.jobs.contains_key(id) {
            debug!(job_id = %id, "error reported for unknown job, ignoring");
            return Ok(());
        }

        let attempts = state.retries.get(id).copied().unwrap_or(0) + 1;
        if retry && attempts <= self.config.max_retries {
            warn!(job_id = %id, attempts, error = %error, "proving job failed, retrying");
            state.retries.insert(id.clone(), attempts);
            state.leases.remove(id);
            if let Some(job) = state.jobs.get(id).cloned() {
                state.queue.enqueue(&job);
            }
            return Ok(());
        }

        self.database
            .set_proving_job_result(
                id,
                ProvingJobResult::Error {
                    error: error.clone(),
                },
            )
            .await?;
        warn!(job_id = %id, attempts, error = %error, "proving job rejected");
        state.leases.remove(id);
        state.queue.remove(id);
        state.retries.remove(id);
        state
            .results
            .insert(id.clone(), ProvingJobResult::Error { error });
        Ok(())
    }

    fn claim_next(
        &self,
        state: &mut BrokerState,
        allow_list: &[ProofType],
    ) -> Option<ClaimedJob> {
        let id = state.queue.dequeue(allow_list)?;
        let job = state.jobs.get(&id).cloned()?;
        let started_at = next_started_at();
        let expires_at = Instant::now() + self.config.job_timeout();
        state.leases.claim(id.clone(), started_at, expires_at);
        debug!(job_id = %id, started_at, "proving job claimed");
        Some(ClaimedJob { job, started_at })
    }

    async fn lock_started(&self) -> Result<MutexGuard<'_, BrokerState>, BrokerError> {
        let state = self.state.lock().await;
        if !state.started {
            return Err(BrokerError::NotStarted);
        }
        Ok(state)
    }

    async fn spawn_sweep(&self) {
        let mut slot = self.sweep.lock().await;
        if let Some(task) = slot.take() {
            let _ = task.shutdown.send(true);
            task.handle.abort();
        }

        let (shutdown, mut signal) = watch::channel(false);
        let state = Arc::clone(&self.state);
        let mut interval = tokio::time::interval(self.config.timeout_check_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = signal.changed() => break,
                    _ = interval.tick() => requeue_expired(&state).await,
                }
            }
        });
        *slot = Some(SweepTask { shutdown, handle });
    }
}

/// Lease-expiry sweep body. Requeued jobs do not consume retry budget: the
/// expiry reflects a worker failure, not a job failure.
async fn requeue_expired(state: &Mutex<BrokerState>) {
    let mut state = state.lock().await;
    let now = Instant::now();
    for id in state.leases.expired(now) {
        state.leases.remove(&id);
        if let Some(job) = state.jobs.get(&id).cloned() {
            warn!(job_id = %id, "job lease expired, returning to queue");
            state.queue.enqueue(&job);
        }
    }
}

/// Lease start timestamps double as an ownership order between workers, so
/// they must be strictly monotonic even across broker instances in the same
/// process. Wall-clock milliseconds with an atomic floor.
fn next_started_at() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64;
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}
