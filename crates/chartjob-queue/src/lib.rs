//! # chartjob-queue
//!
//! Distributed work queue providers for chart export jobs. Two modes:
//!
//! - **redis**: jobs live in Redis hashes and lists, workers announce
//!   completion on a pub/sub channel (see [`keys`] for the layout)
//! - **memory**: in-process queue with a broadcast event stream, used by
//!   tests and single-node runs
//!
//! Both implement [`QueueProvider`], which is all the scheduler sees.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod model;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use model::{
    FinishedJob, JobCounts, JobOutcome, NewQueueJob, QueueEvent, QueueEventKind, QueuedJob,
};
pub use provider::QueueProvider;
