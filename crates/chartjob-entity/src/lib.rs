//! # chartjob-entity
//!
//! Domain models for the chart export scheduler. Job records and export
//! tokens map to database rows and derive `sqlx::FromRow`; tasks and export
//! requests are plain value objects that round-trip through JSON.

pub mod export;
pub mod job;
pub mod token;
