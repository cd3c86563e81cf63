//! Chart export jobs handled by distributed export workers.

use serde::{Deserialize, Serialize};

use super::request::{ExportEntry, UploadOptions};

/// Data for an `exportChart` job on the distributed queue.
///
/// Distributed export workers render and upload the files themselves, so
/// the job carries the raw export entries instead of compiled tasks. The
/// access token is attached by the scheduler when the job is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartExportJob {
    /// Chart to export.
    pub chart_id: String,
    /// User requesting the export; the access token is bound to this user.
    pub user_id: i64,
    /// Requested output files.
    pub exports: Vec<ExportEntry>,
    /// Where the worker uploads the files.
    #[serde(default)]
    pub upload: Option<UploadOptions>,
}
