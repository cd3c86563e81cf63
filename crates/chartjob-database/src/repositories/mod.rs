//! Repository implementations for export jobs and export tokens.

pub mod export_token;
pub mod job;

pub use export_token::ExportTokenRepository;
pub use job::JobRepository;
