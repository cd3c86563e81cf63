//! Task compiler: turns export and invalidation requests into ordered task
//! lists.
//!
//! Output layout for an export request:
//!
//! 1. render tasks, grouped by format in order of first appearance; PDF and
//!    SVG emit one task per entry, PNG emits a single batch task followed,
//!    per PNG entry, by `border`, `compress` and `exif` when requested
//! 2. one `publish` task per file
//! 3. one `file-save` task per file
//! 4. one `s3-upload` task per file
//!
//! Compilation is pure and deterministic.

use chartjob_entity::export::{ExportEntry, ExportFormat, ExportRequest, InvalidateRequest};
use chartjob_entity::job::{RenderTask, Task};

use crate::error::SchedulerError;

/// Compile an export request into tasks.
///
/// Every format is validated before any task is built.
pub fn compile_export(request: &ExportRequest) -> Result<Vec<Task>, SchedulerError> {
    let groups = group_by_format(&request.exports)?;

    let mut tasks = Vec::new();
    let mut filenames: Vec<&str> = Vec::with_capacity(request.exports.len());

    for (format, entries) in &groups {
        match format {
            ExportFormat::Pdf => tasks.extend(entries.iter().map(|e| Task::Pdf(render(e)))),
            ExportFormat::Svg => tasks.extend(entries.iter().map(|e| Task::Svg(render(e)))),
            ExportFormat::Png => {
                tasks.push(Task::Png {
                    sizes: entries.iter().map(|e| render(e)).collect(),
                });
                for entry in entries {
                    post_process_png(entry, &mut tasks);
                }
            }
        }
        filenames.extend(entries.iter().map(|e| e.filename.as_str()));
    }

    if let Some(publish) = &request.publish {
        tasks.extend(filenames.iter().map(|file| Task::Publish {
            file: file.to_string(),
            team_id: publish.team_id.clone(),
            out_file: file.to_string(),
        }));
    }

    if let Some(target) = request.save.as_ref().and_then(|save| save.file.as_ref()) {
        tasks.extend(filenames.iter().map(|file| Task::FileSave {
            file: file.to_string(),
            out_file: target.out_file_for(file),
        }));
    }

    if let Some(target) = request.s3_target() {
        tasks.extend(filenames.iter().map(|file| Task::S3Upload {
            file: file.to_string(),
            bucket: target.bucket.clone(),
            path: target.key_for(file),
            acl: target.acl.clone(),
        }));
    }

    Ok(tasks)
}

/// Compile a cache invalidation request into its single task.
pub fn compile_invalidate(request: &InvalidateRequest) -> Vec<Task> {
    vec![Task::CloudflareInvalidate {
        urls: request.urls.clone(),
    }]
}

/// Parse every entry's format, then group entries by format in order of
/// first appearance.
fn group_by_format(
    entries: &[ExportEntry],
) -> Result<Vec<(ExportFormat, Vec<&ExportEntry>)>, SchedulerError> {
    let parsed = entries
        .iter()
        .map(|entry| {
            entry
                .format
                .parse::<ExportFormat>()
                .map(|format| (format, entry))
                .map_err(|_| SchedulerError::UnsupportedFormat(entry.format.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: Vec<(ExportFormat, Vec<&ExportEntry>)> = Vec::new();
    for (format, entry) in parsed {
        match groups.iter_mut().find(|(f, _)| *f == format) {
            Some((_, group)) => group.push(entry),
            None => groups.push((format, vec![entry])),
        }
    }
    Ok(groups)
}

fn render(entry: &ExportEntry) -> RenderTask {
    RenderTask {
        options: entry.options.clone(),
        output_name: entry.filename.clone(),
    }
}

// Border, then compress, then exif. Workers rely on this order.
fn post_process_png(entry: &ExportEntry, tasks: &mut Vec<Task>) {
    if let Some(border) = &entry.border {
        tasks.push(Task::Border {
            image: entry.filename.clone(),
            output_name: entry.filename.clone(),
            padding: border.padding,
            color: border.color.clone(),
        });
    }
    if entry.compress {
        tasks.push(Task::Compress {
            image: entry.filename.clone(),
        });
    }
    if let Some(exif) = &entry.exif {
        tasks.push(Task::Exif {
            image: entry.filename.clone(),
            tags: exif.tags.clone(),
        });
    }
}
