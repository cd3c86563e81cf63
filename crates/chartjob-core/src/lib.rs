//! # chartjob-core
//!
//! Core crate for the chart export scheduler. Contains the unified error
//! system and the configuration schemas shared by every other crate.
//!
//! This crate has **no** internal dependencies on other chartjob crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
