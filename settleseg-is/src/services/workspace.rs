//! Job-scoped workspace directories
//!
//! Each job owns one directory under the service work dir: the uploaded
//! archive lands there, extraction happens inside it, and the whole tree is
//! removed exactly once when the job finishes, success or failure.

use crate::error::PipelineError;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

const ARCHIVE_NAME: &str = "upload.zip";
const EXTRACT_DIR: &str = "tiles";

/// Exclusively owned per-job directory
pub struct JobWorkspace {
    root: PathBuf,
    cleaned: bool,
}

impl JobWorkspace {
    /// Allocate `work_dir/<job_id>/`
    pub fn create(work_dir: &Path, job_id: Uuid) -> Result<Self, PipelineError> {
        let root = work_dir.join(job_id.to_string());
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            cleaned: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the uploaded archive lives inside the workspace. Intake streams
    /// the upload body directly to this path.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_NAME)
    }

    /// Persist archive bytes already held in memory
    pub fn write_archive(&self, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        let path = self.archive_path();
        let mut file = File::create(&path)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(path)
    }

    /// Extract the stored archive into the workspace.
    ///
    /// Entries whose names escape the extraction root are skipped (zip-slip
    /// guard). A payload that is not a zip archive fails with
    /// `PipelineError::Archive`.
    pub fn extract_archive(&self) -> Result<PathBuf, PipelineError> {
        let archive_path = self.archive_path();
        let file = BufReader::new(File::open(&archive_path)?);
        let mut archive = ZipArchive::new(file)
            .map_err(|e| PipelineError::Archive(format!("not a supported archive: {}", e)))?;

        let extract_root = self.root.join(EXTRACT_DIR);
        std::fs::create_dir_all(&extract_root)?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| PipelineError::Archive(format!("corrupt archive entry: {}", e)))?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!(name = %entry.name(), "Skipping archive entry with unsafe path");
                continue;
            };
            let target = extract_root.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }

        debug!(root = %extract_root.display(), "Archive extracted");
        Ok(extract_root)
    }

    /// Remove the workspace directory. Idempotent; errors are logged, not
    /// propagated, because cleanup runs on every exit path.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %self.root.display(), error = %e, "Failed to remove job workspace");
            }
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn extracts_nested_entries() {
        let work = TempDir::new().unwrap();
        let mut ws = JobWorkspace::create(work.path(), Uuid::new_v4()).unwrap();

        let bytes = zip_bytes(&[
            ("satellite-256/qc_0_0.tif", b"sat"),
            ("bc-256/qc_0_0.tif", b"bc"),
        ]);
        ws.write_archive(&bytes).unwrap();
        let root = ws.extract_archive().unwrap();

        assert_eq!(
            std::fs::read(root.join("satellite-256/qc_0_0.tif")).unwrap(),
            b"sat"
        );
        assert_eq!(std::fs::read(root.join("bc-256/qc_0_0.tif")).unwrap(), b"bc");
        ws.cleanup();
        assert!(!root.exists());
    }

    #[test]
    fn rejects_non_zip_payload() {
        let work = TempDir::new().unwrap();
        let ws = JobWorkspace::create(work.path(), Uuid::new_v4()).unwrap();
        ws.write_archive(b"definitely not a zip").unwrap();
        assert!(matches!(
            ws.extract_archive(),
            Err(PipelineError::Archive(_))
        ));
    }

    #[test]
    fn cleanup_is_idempotent_and_runs_on_drop() {
        let work = TempDir::new().unwrap();
        let root;
        {
            let mut ws = JobWorkspace::create(work.path(), Uuid::new_v4()).unwrap();
            root = ws.root().to_path_buf();
            assert!(root.exists());
            ws.cleanup();
            ws.cleanup();
            assert!(!root.exists());
        }
        // Drop after explicit cleanup must not panic
        let ws2 = JobWorkspace::create(work.path(), Uuid::new_v4()).unwrap();
        let root2 = ws2.root().to_path_buf();
        drop(ws2);
        assert!(!root2.exists());
    }
}
