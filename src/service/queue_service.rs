use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::module::proving_job::model::{ProofType, ProvingJob, ProvingJobId};

/// Fixed cross-type importance ranking. Higher rank is claimed first; the
/// consumer's allow-list only filters eligibility, it never reorders.
#[derive(Debug, Clone)]
pub struct ProofTypePriorities {
    ranks: HashMap<ProofType, u8>,
}

impl ProofTypePriorities {
    pub fn rank(&self, proof_type: ProofType) -> u8 {
        self.ranks.get(&proof_type).copied().unwrap_or(0)
    }

    pub fn with_rank(mut self, proof_type: ProofType, rank: u8) -> Self {
        self.ranks.insert(proof_type, rank);
        self
    }
}

impl Default for ProofTypePriorities {
    fn default() -> Self {
        let mut ranks = HashMap::new();
        for proof_type in ProofType::ALL {
            let rank = match proof_type {
                ProofType::RootRollup => 100,
                ProofType::BlockMergeRollup => 90,
                ProofType::BlockRootRollup => 80,
                ProofType::MergeRollup => 70,
                ProofType::PublicBaseRollup => 60,
                ProofType::PrivateBaseRollup => 50,
                ProofType::TubeProof => 40,
                ProofType::PublicVm => 30,
                ProofType::RootParity => 20,
                ProofType::BaseParity => 10,
            };
            ranks.insert(proof_type, rank);
        }
        Self { ranks }
    }
}

#[derive(Debug, Clone)]
struct QueueSlot {
    block_number: u64,
    seq: u64,
    id: ProvingJobId,
}

impl PartialEq for QueueSlot {
    fn eq(&self, other: &Self) -> bool {
        self.block_number == other.block_number && self.seq == other.seq
    }
}

impl Eq for QueueSlot {}

impl PartialOrd for QueueSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.block_number, self.seq).cmp(&(other.block_number, other.seq))
    }
}

/// All jobs currently in `in-queue` state. One min-heap per proof type keyed
/// by (block_number, insertion order); cancellation removes the id from the
/// live set and the stale heap entry is skipped at dequeue time.
#[derive(Debug)]
pub struct JobQueue {
    priorities: ProofTypePriorities,
    heaps: HashMap<ProofType, BinaryHeap<Reverse<QueueSlot>>>,
    queued: HashSet<ProvingJobId>,
    seq: u64,
}

impl JobQueue {
    pub fn new(priorities: ProofTypePriorities) -> Self {
        Self {
            priorities,
            heaps: HashMap::new(),
            queued: HashSet::new(),
            seq: 0,
        }
    }

    pub fn enqueue(&mut self, job: &ProvingJob) {
        if !self.queued.insert(job.id.clone()) {
            return;
        }
        self.seq += 1;
        self.heaps
            .entry(job.id.proof_type)
            .or_default()
            .push(Reverse(QueueSlot {
                block_number: job.block_number,
                seq: self.seq,
                id: job.id.clone(),
            }));
    }

    pub fn remove(&mut self, id: &ProvingJobId) {
        self.queued.remove(id);
    }

    pub fn contains(&self, id: &ProvingJobId) -> bool {
        self.queued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Pops the highest-priority job whose proof type is in `allow_list`;
    /// an empty allow-list means no restriction.
    pub fn dequeue(&mut self, allow_list: &[ProofType]) -> Option<ProvingJobId> {
        let eligible: &[ProofType] = if allow_list.is_empty() {
            &ProofType::ALL
        } else {
            allow_list
        };

        let mut best: Option<(u8, u64, u64, ProofType)> = None;
        for &proof_type in eligible {
            let Some(heap) = self.heaps.get_mut(&proof_type) else {
                continue;
            };
            while let Some(Reverse(slot)) = heap.peek() {
                if self.queued.contains(&slot.id) {
                    break;
                }
                heap.pop();
            }
            let Some(Reverse(slot)) = heap.peek() else {
                continue;
            };
            let rank = self.priorities.rank(proof_type);
            let candidate = (rank, slot.block_number, slot.seq, proof_type);
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let wins = rank > current.0
                        || (rank == current.0
                            && (slot.block_number < current.1
                                || (slot.block_number == current.1 && slot.seq < current.2)));
                    if wins { Some(candidate) } else { Some(current) }
                }
            };
        }

        let (_, _, _, proof_type) = best?;
        let Reverse(slot) = self.heaps.get_mut(&proof_type)?.pop()?;
        self.queued.remove(&slot.id);
        Some(slot.id)
    }
}
