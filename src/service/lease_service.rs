use std::collections::HashMap;

use tokio::time::Instant;

use crate::module::proving_job::model::ProvingJobId;

/// Ephemeral claim a worker holds on a job. Never persisted; a broker restart
/// treats every previously leased job as unclaimed.
#[derive(Debug, Clone)]
pub struct Lease {
    pub started_at: u64,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: HashMap<ProvingJobId, Lease>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lease, replacing any existing one for the same job.
    pub fn claim(&mut self, id: ProvingJobId, started_at: u64, expires_at: Instant) {
        self.leases.insert(
            id,
            Lease {
                started_at,
                expires_at,
            },
        );
    }

    pub fn refresh(&mut self, id: &ProvingJobId, expires_at: Instant) -> bool {
        match self.leases.get_mut(id) {
            Some(lease) => {
                lease.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ProvingJobId) -> Option<&Lease> {
        self.leases.get(id)
    }

    pub fn contains(&self, id: &ProvingJobId) -> bool {
        self.leases.contains_key(id)
    }

    pub fn remove(&mut self, id: &ProvingJobId) -> Option<Lease> {
        self.leases.remove(id)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Jobs whose lease has passed `now` without a heartbeat.
    pub fn expired(&self, now: Instant) -> Vec<ProvingJobId> {
        self.leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
