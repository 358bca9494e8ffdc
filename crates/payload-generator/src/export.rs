//! Export rendered payloads to files.

use crate::error::RenderError;
use payload_core::{PayloadContext, PayloadDefinition};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Write `content` to the payload's export target, if an export is enabled.
///
/// `render_path` renders the export path template with the same resolver as
/// the payload body, so `{{id}}` in the path matches `{{id}}` in the content.
/// Returns the written path.
pub fn export_payload<F>(
    payload: &PayloadDefinition,
    context: &PayloadContext,
    content: &str,
    render_path: F,
) -> Result<Option<PathBuf>, RenderError>
where
    F: FnOnce(&str) -> Result<String, RenderError>,
{
    let Some(rule) = payload.active_export() else {
        return Ok(None);
    };
    let Some(template) = rule.template.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let rendered = render_path(template)?;
    let rendered = rendered.trim();
    if rendered.is_empty() {
        return Err(RenderError::EmptyExportPath(
            context.template_file_name.clone(),
        ));
    }

    // Absolute paths replace the base.
    let target = rule.base_path.join(rendered);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| RenderError::ExportIo {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    write_file(&target, content, rule.overwrite)?;
    Ok(Some(target))
}

fn write_file(path: &Path, content: &str, overwrite: bool) -> Result<(), RenderError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|source| match source.kind() {
        ErrorKind::AlreadyExists => RenderError::ExportExists(path.to_path_buf()),
        _ => RenderError::ExportIo {
            path: path.to_path_buf(),
            source,
        },
    })?;

    file.write_all(content.as_bytes())
        .map_err(|source| RenderError::ExportIo {
            path: path.to_path_buf(),
            source,
        })
}
