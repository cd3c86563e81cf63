//! In-memory stores.

pub mod export_token;
pub mod job;

pub use export_token::MemoryTokenStore;
pub use job::MemoryJobStore;
