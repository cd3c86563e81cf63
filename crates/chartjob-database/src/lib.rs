//! # chartjob-database
//!
//! PostgreSQL connection management and the repositories behind the
//! relational job backend: the export job table and export access tokens.
//!
//! The scheduler talks to storage through [`JobStore`] and
//! [`ExportTokenStore`]. The PostgreSQL repositories implement both; the
//! `memory` feature adds in-process stores for tests and local runs.

pub mod connection;
#[cfg(feature = "memory")]
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{ExportTokenStore, JobStore};
