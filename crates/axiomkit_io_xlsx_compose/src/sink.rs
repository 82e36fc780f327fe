//! File sinks receiving serialized workbook buffers.

use std::fs;
use std::path::PathBuf;

use crate::spec::ExportError;

/// Destination for a serialized workbook.
pub trait FileSink {
    /// Persist `buffer` under `file_name` (extension included).
    fn save(&self, buffer: &[u8], file_type: &str, file_name: &str) -> Result<(), ExportError>;
}

/// Writes files into a local directory, creating it when missing.
#[derive(Debug, Clone)]
pub struct FsFileSink {
    dir_out: PathBuf,
}

impl FsFileSink {
    pub fn new(dir_out: impl Into<PathBuf>) -> Self {
        Self {
            dir_out: dir_out.into(),
        }
    }
}

impl FileSink for FsFileSink {
    fn save(&self, buffer: &[u8], file_type: &str, file_name: &str) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir_out)?;
        let path_out = self.dir_out.join(file_name);
        fs::write(&path_out, buffer)?;
        log::debug!(
            "Saved {} byte(s) ({file_type}) to {}",
            buffer.len(),
            path_out.display()
        );
        Ok(())
    }
}
