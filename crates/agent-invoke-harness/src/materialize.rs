//! Persists agent-generated files.
//! The writer is injected so failures can be exercised without a real disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::content::OutputFile;
use crate::errors::{HarnessError, PartialFailure};

/// File system abstraction used by the materializer.
pub trait FileWriter: Send + Sync {
    fn create_dir_all(&self, dir: &Path) -> std::io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn write(&self, path: &Path, content: &[u8]) -> std::io::Result<()>;
}

/// Default implementation using `std::fs`.
pub struct StdFileWriter;

impl FileWriter for StdFileWriter {
    fn create_dir_all(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        std::fs::write(path, content)
    }
}

/// Writes output files into a directory with collision-safe names.
#[derive(Clone)]
pub struct Materializer {
    writer: Arc<dyn FileWriter>,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(Arc::new(StdFileWriter))
    }
}

impl Materializer {
    pub fn new(writer: Arc<dyn FileWriter>) -> Self {
        Self { writer }
    }

    /// Saves `files` under `output_dir` in arrival order.
    ///
    /// Does nothing when there are no files or no directory. A name that
    /// already exists gets the file's 1-based position inserted before its
    /// extension (`report_2.csv`). The first failed write stops the loop;
    /// files written before it stay on disk and their paths are returned
    /// with the error.
    pub fn materialize(
        &self,
        output_dir: Option<&Path>,
        files: &[OutputFile],
    ) -> Result<Vec<PathBuf>, PartialFailure<Vec<PathBuf>>> {
        let Some(dir) = output_dir.filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(Vec::new());
        };
        if files.is_empty() {
            return Ok(Vec::new());
        }

        if let Err(e) = self.writer.create_dir_all(dir) {
            return Err(PartialFailure::new(
                Vec::new(),
                HarnessError::io("failed to create output directory", dir, e),
            ));
        }

        let mut saved = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let Some(name) = safe_file_name(&file.name) else {
                warn!(name = %file.name, "skipping generated file without a usable name");
                continue;
            };
            let mut path = dir.join(name);
            if self.writer.exists(&path) {
                path = dir.join(indexed_name(name, i + 1));
            }
            if let Err(e) = self.writer.write(&path, &file.bytes) {
                return Err(PartialFailure::new(
                    saved,
                    HarnessError::io("failed to save file", path, e),
                ));
            }
            debug!(path = %path.display(), size = file.bytes.len(), "saved generated file");
            saved.push(path);
        }
        Ok(saved)
    }
}

/// Strips every directory component from an untrusted name.
///
/// Both separators are honoured regardless of platform; names that reduce
/// to nothing, `.` or `..` are rejected.
fn safe_file_name(declared: &str) -> Option<&str> {
    let base = declared.rsplit(['/', '\\']).next()?;
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

fn indexed_name(name: &str, index: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{index}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}_{index}"),
    }
}
