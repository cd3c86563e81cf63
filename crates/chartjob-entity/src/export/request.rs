//! Export and cache-invalidation request models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output formats the render workers can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raster image, rendered in batches.
    Png,
    /// Vector document.
    Pdf,
    /// Vector image.
    Svg,
}

impl ExportFormat {
    /// Return the format as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = chartjob_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "pdf" => Ok(Self::Pdf),
            "svg" => Ok(Self::Svg),
            _ => Err(chartjob_core::AppError::validation(format!(
                "Invalid export format: '{s}'. Expected one of: png, pdf, svg"
            ))),
        }
    }
}

/// Border added around a PNG after rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderOptions {
    /// Border width in pixels.
    pub padding: u32,
    /// Border color (CSS notation).
    pub color: String,
}

/// EXIF tags written into a PNG after rendering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExifOptions {
    /// Tag name to value.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A single requested output file.
///
/// `format` is kept as the raw string from the caller so that unknown
/// formats reach the task compiler and are rejected there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Requested format (`png`, `pdf`, `svg`).
    pub format: String,
    /// Output file name.
    pub filename: String,
    /// Renderer options.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Optional border (PNG only).
    #[serde(default)]
    pub border: Option<BorderOptions>,
    /// Compress the PNG after rendering.
    #[serde(default)]
    pub compress: bool,
    /// Optional EXIF tags (PNG only).
    #[serde(default)]
    pub exif: Option<ExifOptions>,
}

/// Publish the exported files to a team's publish target.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOptions {
    /// Team whose target should receive the files. `None` uses the default target.
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Local directory receiving copies of the exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTarget {
    /// Destination directory.
    pub path: String,
}

impl FileTarget {
    /// Destination of `filename`. A blank directory keeps the bare filename.
    pub fn out_file_for(&self, filename: &str) -> String {
        let dir = self.path.trim_end_matches('/');
        if dir.is_empty() {
            filename.to_string()
        } else {
            format!("{dir}/{filename}")
        }
    }
}

/// S3 location receiving the exported files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Target {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix inside the bucket.
    #[serde(default)]
    pub path: String,
    /// Canned ACL.
    #[serde(default = "default_acl")]
    pub acl: String,
}

impl S3Target {
    /// Full object key for a file name.
    pub fn key_for(&self, filename: &str) -> String {
        let prefix = self.path.trim_matches('/');
        if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{prefix}/{filename}")
        }
    }
}

/// Where exported files are saved after rendering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Copy to a local directory.
    #[serde(default)]
    pub file: Option<FileTarget>,
    /// Upload to S3.
    #[serde(default)]
    pub s3: Option<S3Target>,
}

/// Upload destination forwarded to distributed export workers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Upload to S3.
    #[serde(default)]
    pub s3: Option<S3Target>,
}

/// A structured request to export a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Chart to export.
    pub chart_id: String,
    /// User requesting the export.
    pub user_id: Option<i64>,
    /// Requested output files.
    pub exports: Vec<ExportEntry>,
    /// Publish the files after rendering.
    #[serde(default)]
    pub publish: Option<PublishOptions>,
    /// Save the files after rendering.
    #[serde(default)]
    pub save: Option<SaveOptions>,
    /// Upload the files after rendering.
    #[serde(default)]
    pub upload: Option<UploadOptions>,
}

impl ExportRequest {
    /// S3 target from `save.s3`, falling back to `upload.s3`.
    pub fn s3_target(&self) -> Option<&S3Target> {
        self.save
            .as_ref()
            .and_then(|save| save.s3.as_ref())
            .or_else(|| self.upload.as_ref().and_then(|upload| upload.s3.as_ref()))
    }
}

/// A request to purge a chart's CDN cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    /// Chart whose URLs are purged.
    pub chart_id: Option<String>,
    /// User requesting the purge.
    pub user_id: Option<i64>,
    /// URLs to purge.
    pub urls: Vec<String>,
}

fn default_acl() -> String {
    "public-read".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_str() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert!("tiff".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_request_from_json() {
        let request: ExportRequest = serde_json::from_value(json!({
            "chartId": "abc12",
            "userId": 7,
            "exports": [{
                "format": "png",
                "filename": "a.png",
                "options": { "width": 600 },
                "border": { "padding": 4, "color": "#fff" }
            }],
            "upload": { "s3": { "bucket": "charts", "path": "exports/" } }
        }))
        .unwrap();

        assert_eq!(request.exports.len(), 1);
        assert!(!request.exports[0].compress);
        let target = request.s3_target().unwrap();
        assert_eq!(target.acl, "public-read");
        assert_eq!(target.key_for("a.png"), "exports/a.png");
    }

    #[test]
    fn test_save_s3_wins_over_upload() {
        let save_target = S3Target {
            bucket: "save".into(),
            path: String::new(),
            acl: "private".into(),
        };
        let request = ExportRequest {
            chart_id: "abc12".into(),
            user_id: None,
            exports: Vec::new(),
            publish: None,
            save: Some(SaveOptions {
                file: None,
                s3: Some(save_target.clone()),
            }),
            upload: Some(UploadOptions {
                s3: Some(S3Target {
                    bucket: "upload".into(),
                    path: String::new(),
                    acl: "private".into(),
                }),
            }),
        };
        assert_eq!(request.s3_target(), Some(&save_target));
        assert_eq!(save_target.key_for("a.pdf"), "a.pdf");
    }
}
