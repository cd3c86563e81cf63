//! Export job scheduling and completion tracking.
//!
//! This crate provides:
//! - A task compiler turning export and cache invalidation requests into
//!   ordered task lists
//! - Two job backends: the relational job table (polled) and a distributed
//!   work queue (event driven)
//! - A scheduler choosing the backend per queue, with handles to wait for
//!   results under a deadline
//! - Token-guarded chart exports and queue health diagnostics

pub mod backend;
pub mod compiler;
pub mod error;
pub mod export;
pub mod health;
pub mod scheduler;
pub mod settings;

pub use backend::{JobBackend, JobRef, JobSpec, ScheduleOptions, WorkerJob};
pub use error::{CompletionCode, JobCompletionError, SchedulerError};
pub use export::{ChartExportHandle, TokenGuard};
pub use health::QueueHealth;
pub use scheduler::{BulkJobHandle, JobHandle, JobScheduler, UploadTargetResolver};
pub use settings::WorkerSettings;
