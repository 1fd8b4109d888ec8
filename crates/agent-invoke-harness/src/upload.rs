use std::path::{Path, PathBuf};

use tracing::debug;

use crate::content::UploadFile;
use crate::errors::HarnessError;
use crate::mime;
use crate::model::MAX_UPLOAD_BYTES;

/// Reads the configured upload paths into upload-ready records.
///
/// Files are processed in the given order. The running size total is checked
/// after each `stat` and before the content is read, so a request that
/// crosses the ceiling fails without reading any further file. No partial
/// list is returned on failure.
pub fn assemble(paths: &[PathBuf]) -> Result<Vec<UploadFile>, HarnessError> {
    assemble_with_limit(paths, MAX_UPLOAD_BYTES)
}

pub(crate) fn assemble_with_limit(
    paths: &[PathBuf],
    limit: u64,
) -> Result<Vec<UploadFile>, HarnessError> {
    let mut files = Vec::with_capacity(paths.len());
    let mut total_bytes = 0_u64;
    for path in paths {
        let metadata = std::fs::metadata(path)
            .map_err(|e| HarnessError::io("failed to get file info for", path, e))?;
        total_bytes = total_bytes.saturating_add(metadata.len());
        if total_bytes > limit {
            return Err(HarnessError::UploadTooLarge { total_bytes });
        }

        let bytes = std::fs::read(path)
            .map_err(|e| HarnessError::io("failed to read file", path, e))?;
        let name = display_name(path);
        let media_type = mime::classify(path, &bytes);
        debug!(file = %name, media_type = %media_type, size = bytes.len(), "added file for upload");
        files.push(UploadFile {
            name,
            path: path.clone(),
            media_type,
            bytes,
        });
    }
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
