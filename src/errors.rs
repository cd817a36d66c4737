//! Error types for the connection pool

use crate::features::PoolFeature;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("No reusable idle connection within {0:?}")]
    AcquireTimeout(std::time::Duration),

    #[error("Acquire was interrupted while waiting for an idle connection")]
    AcquisitionInterrupted,

    #[error("Capability {0} is not supported")]
    UnsupportedCapability(PoolFeature),

    #[error("Idle queue is at capacity")]
    IdleQueueFull,

    #[error("Frozen queue is at capacity")]
    FrozenQueueFull,

    #[error("Slot {index} is outside a pool of {max_pool_size} slots")]
    SlotOutOfRange { index: usize, max_pool_size: usize },

    #[error("Pool has been shut down")]
    PoolClosed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to start background worker: {0}")]
    WorkerSpawn(String),
}

pub type PoolResult<T> = Result<T, PoolError>;
