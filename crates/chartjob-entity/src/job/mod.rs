//! Export job domain entities.

pub mod model;
pub mod status;
pub mod task;

pub use model::{CreateJob, JobRecord};
pub use status::JobStatus;
pub use task::{RenderTask, Task};
