use std::env;
use std::time::Duration;

use crate::service::queue_service::ProofTypePriorities;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub job_timeout_ms: u64,
    pub timeout_check_interval_ms: u64,
    pub max_retries: u32,
    pub priorities: ProofTypePriorities,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            job_timeout_ms: 30_000,
            timeout_check_interval_ms: 10_000,
            max_retries: 3,
            priorities: ProofTypePriorities::default(),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        Ok(Self {
            job_timeout_ms: read_optional_u64("PROVER_BROKER_JOB_TIMEOUT_MS", 30_000)?,
            timeout_check_interval_ms: read_optional_u64(
                "PROVER_BROKER_TIMEOUT_CHECK_INTERVAL_MS",
                10_000,
            )?,
            max_retries: read_optional_u32("PROVER_BROKER_JOB_MAX_RETRIES", 3)?,
            priorities: ProofTypePriorities::default(),
        })
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms.max(1))
    }
}

fn read_optional_u64(key: &str, default: u64) -> Result<u64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_u32(key: &str, default: u32) -> Result<u32, String> {
    match env::var(key) {
        Ok(v) => v.parse::<u32>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn load_dotenv_layers() {
    for path in [".env", "../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
