use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::classify::{classify, inspect_pdf, Classification};
use super::directory::analyze_directory;
use super::{FileImporting, ImportError, ImportOutcome, ImportResult};
use crate::access::{AccessGuard, FilesystemAccess, ScopedAccess};

/// The default import pipeline. Holds no state besides the access mechanism.
#[derive(Debug, Clone)]
pub struct FileImportService {
    access: Arc<dyn AccessGuard>,
}

impl Default for FileImportService {
    fn default() -> Self {
        Self::with_access(Arc::new(FilesystemAccess))
    }
}

impl FileImportService {
    pub fn with_access(access: Arc<dyn AccessGuard>) -> Self {
        FileImportService { access }
    }

    /// Imports one location, returning what it contributed.
    async fn import_location(&self, path: &Path) -> Result<Vec<ImportResult>, ImportError> {
        let _scope = ScopedAccess::acquire(self.access.as_ref(), path);

        let metadata = fs::metadata(path).await.map_err(|e| {
            warn!("Cannot read {}: {}", path.display(), e);
            ImportError::from_io(&e)
        })?;
        let resolved = fs::canonicalize(path)
            .await
            .map_err(|e| ImportError::from_io(&e))?;

        if metadata.is_dir() {
            self.import_folder(&resolved).await
        } else {
            import_file(&resolved).await.map(|r| vec![r])
        }
    }

    async fn import_folder(&self, folder: &Path) -> Result<Vec<ImportResult>, ImportError> {
        let analysis = analyze_directory(folder).await.map_err(|e| {
            warn!("Cannot list {}: {}", folder.display(), e);
            match e.kind() {
                std::io::ErrorKind::PermissionDenied => ImportError::PermissionDenied,
                _ => ImportError::Unknown,
            }
        })?;

        if !analysis.pdfs.is_empty() {
            return Ok(analysis.pdfs);
        }
        if analysis.total_items == 0 {
            return Err(ImportError::IsDirectoryButEmpty);
        }
        if analysis.has_subfolders() {
            debug!(
                "No top-level PDFs in {}, offering {} subfolders",
                folder.display(),
                analysis.subfolders.len()
            );
            return Err(ImportError::DirectoryHasNoValidPdfs {
                has_subfolders: true,
                subfolders: analysis.subfolders,
            });
        }
        Err(ImportError::DirectoryHasNoValidPdfs {
            has_subfolders: false,
            subfolders: Vec::new(),
        })
    }
}

async fn import_file(path: &Path) -> Result<ImportResult, ImportError> {
    match classify(path).await {
        Classification::RegularFile { pdf: true, size } => {
            let health = inspect_pdf(path, size).await;
            Ok(ImportResult::from_health(path.to_path_buf(), path.to_path_buf(), health))
        }
        Classification::RegularFile { pdf: false, .. } => Err(ImportError::InvalidFileType),
        // Raced with a change on disk after the first metadata read.
        Classification::Directory => Err(ImportError::Unknown),
        Classification::Unreadable(kind) => Err(ImportError::from_io(&std::io::Error::from(kind))),
    }
}

#[async_trait]
impl FileImporting for FileImportService {
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    async fn process_import(&self, paths: &[PathBuf]) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();

        for path in paths {
            match self.import_location(path).await {
                Ok(found) => {
                    debug!("{} yielded {} PDFs", path.display(), found.len());
                    outcome.successes.extend(found);
                }
                Err(error) => {
                    debug!("{} failed: {}", path.display(), error);
                    outcome.failures.insert(path.clone(), error);
                }
            }
        }

        info!(
            "Import finished: {} PDFs found, {} locations failed",
            outcome.successes.len(),
            outcome.failures.len()
        );
        outcome
    }
}
