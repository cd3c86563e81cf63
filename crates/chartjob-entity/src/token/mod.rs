//! Export access token entities.

pub mod model;

pub use model::ExportToken;
