use super::model::ProvingJobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("unknown proving job: {0}")]
    UnknownJob(ProvingJobId),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("duplicate proving job id: {0}")]
    DuplicateJobId(ProvingJobId),

    #[error("broker is not started")]
    NotStarted,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
