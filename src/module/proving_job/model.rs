use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    BaseParity,
    RootParity,
    PrivateBaseRollup,
    PublicBaseRollup,
    MergeRollup,
    BlockRootRollup,
    BlockMergeRollup,
    RootRollup,
    TubeProof,
    PublicVm,
}

impl ProofType {
    pub const ALL: [ProofType; 10] = [
        Self::BaseParity,
        Self::RootParity,
        Self::PrivateBaseRollup,
        Self::PublicBaseRollup,
        Self::MergeRollup,
        Self::BlockRootRollup,
        Self::BlockMergeRollup,
        Self::RootRollup,
        Self::TubeProof,
        Self::PublicVm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseParity => "base_parity",
            Self::RootParity => "root_parity",
            Self::PrivateBaseRollup => "private_base_rollup",
            Self::PublicBaseRollup => "public_base_rollup",
            Self::MergeRollup => "merge_rollup",
            Self::BlockRootRollup => "block_root_rollup",
            Self::BlockMergeRollup => "block_merge_rollup",
            Self::RootRollup => "root_rollup",
            Self::TubeProof => "tube_proof",
            Self::PublicVm => "public_vm",
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer-generated job identifier; the broker never mints ids itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvingJobId {
    pub proof_type: ProofType,
    pub id: Uuid,
}

impl ProvingJobId {
    pub fn new(proof_type: ProofType) -> Self {
        Self {
            proof_type,
            id: Uuid::new_v4(),
        }
    }
}

impl fmt::Display for ProvingJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.proof_type, self.id)
    }
}

/// One unit of proving work. Immutable once enqueued; `inputs` is opaque to
/// the broker and only ever handed through to workers and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvingJob {
    pub id: ProvingJobId,
    pub block_number: u64,
    pub inputs: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProvingJobResult {
    Success { value: Value },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum JobStatus {
    NotFound,
    InQueue,
    InProgress,
    Resolved { value: Value },
    Rejected { error: String },
}

/// Returned from a successful claim. Workers echo `started_at` back on every
/// heartbeat; it decides lease ownership when two workers hold the same job
/// after a broker restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedJob {
    pub job: ProvingJob,
    pub started_at: u64,
}
