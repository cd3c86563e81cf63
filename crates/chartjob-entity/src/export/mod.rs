//! Export request value objects.

pub mod chart;
pub mod request;

pub use chart::ChartExportJob;
pub use request::{
    BorderOptions, ExifOptions, ExportEntry, ExportFormat, ExportRequest, FileTarget,
    InvalidateRequest, PublishOptions, S3Target, SaveOptions, UploadOptions,
};
