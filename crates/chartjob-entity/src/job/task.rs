//! Atomic task descriptors executed by the render workers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Render options for a single output file.
///
/// The options themselves are opaque to the scheduler and are passed to the
/// renderer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTask {
    /// Renderer options (width, zoom, transparent, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
    /// File the renderer writes.
    #[serde(rename = "outputName")]
    pub output_name: String,
}

/// One unit of work inside a job.
///
/// Serialized as `{"action": "<kind>", "params": {...}}`. Later tasks may
/// operate on files written by earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "kebab-case")]
pub enum Task {
    /// Purge CDN caches for the given URLs.
    CloudflareInvalidate {
        /// URLs to purge.
        urls: Vec<String>,
    },
    /// Render one PDF.
    Pdf(RenderTask),
    /// Render one SVG.
    Svg(RenderTask),
    /// Render every PNG of the job in one batch.
    Png {
        /// One entry per PNG output.
        sizes: Vec<RenderTask>,
    },
    /// Add a border around an image, in place.
    #[serde(rename_all = "camelCase")]
    Border {
        /// Input image.
        image: String,
        /// Output image.
        output_name: String,
        /// Border width in pixels.
        padding: u32,
        /// Border color.
        color: String,
    },
    /// Losslessly compress an image.
    Compress {
        /// Image to compress.
        image: String,
    },
    /// Write EXIF metadata tags into an image.
    Exif {
        /// Image to tag.
        image: String,
        /// Tag name to value.
        tags: BTreeMap<String, String>,
    },
    /// Publish a file to the (team) publish target.
    #[serde(rename_all = "camelCase")]
    Publish {
        /// Local file.
        file: String,
        /// Team whose publish target receives the file.
        team_id: Option<String>,
        /// Remote file name.
        out_file: String,
    },
    /// Copy a file to a local directory.
    #[serde(rename_all = "camelCase")]
    FileSave {
        /// Local file.
        file: String,
        /// Destination path.
        out_file: String,
    },
    /// Upload a file to S3.
    S3Upload {
        /// Local file.
        file: String,
        /// Destination bucket.
        bucket: String,
        /// Destination key.
        path: String,
        /// Canned ACL.
        acl: String,
    },
}

impl Task {
    /// Action name as the worker sees it.
    pub fn action(&self) -> &'static str {
        match self {
            Self::CloudflareInvalidate { .. } => "cloudflare-invalidate",
            Self::Pdf(_) => "pdf",
            Self::Svg(_) => "svg",
            Self::Png { .. } => "png",
            Self::Border { .. } => "border",
            Self::Compress { .. } => "compress",
            Self::Exif { .. } => "exif",
            Self::Publish { .. } => "publish",
            Self::FileSave { .. } => "file-save",
            Self::S3Upload { .. } => "s3-upload",
        }
    }
}
