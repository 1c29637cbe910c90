//! The import pipeline: from user-selected locations to importable PDFs.
//!
//! The user hands over a batch of locations, picked in a file dialog or dropped
//! onto the window. Each one is either a single file or a folder. The pipeline
//! turns that batch into an [`ImportOutcome`]:
//!
//! *   **successes** — every PDF found, in input order, then folder-scan order.
//!     Each carries the folder or file it was selected through and a validity flag.
//!     Unusable PDFs ("zombies", e.g. zero-byte files) are successes too, flagged
//!     invalid with an [`InvalidReason`], so the user can see them and discard them.
//! *   **failures** — locations that produced nothing at all, with an [`ImportError`]
//!     explaining why.
//!
//! # Stages
//!
//! *   [`classify`] inspects one entry: file or directory, PDF or not, usable or not.
//! *   [`analyze_directory`] scans a folder one level deep, skipping hidden entries.
//!     Subfolders are listed but never descended into, which keeps I/O bounded
//!     and matches the non-recursive way sandboxes grant folder access.
//! *   [`FileImportService`] runs both over a batch, sequentially, acquiring a
//!     [`ScopedAccess`](crate::access::ScopedAccess) grant per location.
//!
//! # Folder rules
//!
//! | Folder content                         | Outcome                                            |
//! |----------------------------------------|----------------------------------------------------|
//! | at least one PDF (valid or not)        | all top-level PDFs are successes                   |
//! | nothing at all                         | [`ImportError::IsDirectoryButEmpty`]               |
//! | no PDFs, but subfolders                | [`ImportError::DirectoryHasNoValidPdfs`] with them |
//! | only non-PDF files                     | [`ImportError::DirectoryHasNoValidPdfs`], no list  |
//!
//! A failure never stops the batch; every location is processed and the results
//! are reported together.
//!
//! # Example
//!
//! ```rust,no_run
//! use signum_core::import::{FileImportService, FileImporting};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = FileImportService::default();
//!     let outcome = service.process_import(&[PathBuf::from("/cases/2024")]).await;
//!     for pdf in &outcome.successes {
//!         println!("{} (valid: {})", pdf.path.display(), pdf.is_valid);
//!     }
//!     for (path, error) in outcome.failures.iter() {
//!         println!("{}: {}", path.display(), error);
//!     }
//! }
//! ```

pub use self::classify::{classify, inspect_pdf, is_pdf_path, Classification, PdfHealth};
pub use self::directory::{analyze_directory, DirectoryAnalysis};
pub use self::service::FileImportService;

mod classify;
mod directory;
mod service;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a PDF that was found cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// Zero bytes on disk.
    EmptyFile,
    /// Has content, but not a PDF's.
    Corrupted,
    /// Exists, but cannot be opened for reading.
    ReadPermission,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidReason::EmptyFile => "the file is empty",
            InvalidReason::Corrupted => "the file is damaged or not really a PDF",
            InvalidReason::ReadPermission => "the file cannot be read",
        })
    }
}

/// Why a whole selected location could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportError {
    #[error("No permission to read this location.")]
    PermissionDenied,

    #[error("Not a valid PDF file.")]
    InvalidFileType,

    #[error("The file could not be read.")]
    Unreadable,

    #[error("The folder is empty.")]
    IsDirectoryButEmpty,

    #[error("{}", no_pdfs_message(*has_subfolders))]
    DirectoryHasNoValidPdfs {
        has_subfolders: bool,
        subfolders: Vec<PathBuf>,
    },

    #[error("Unknown error.")]
    Unknown,
}

fn no_pdfs_message(has_subfolders: bool) -> &'static str {
    if has_subfolders {
        "There are no PDFs at the top level. The folder contains subfolders."
    } else {
        "The folder contains files, but none of them is a PDF."
    }
}

impl ImportError {
    /// Maps an I/O error reading a location's metadata or listing.
    pub(crate) fn from_io(error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => ImportError::PermissionDenied,
            _ => ImportError::Unreadable,
        }
    }
}

/// One PDF found by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Resolved location of the PDF.
    pub path: PathBuf,
    /// The selection it was found through: the file itself or its parent folder.
    pub origin: PathBuf,
    pub is_valid: bool,
    pub invalid_reason: Option<InvalidReason>,
}

impl ImportResult {
    pub fn valid(path: PathBuf, origin: PathBuf) -> Self {
        ImportResult {
            path,
            origin,
            is_valid: true,
            invalid_reason: None,
        }
    }

    pub fn invalid(path: PathBuf, origin: PathBuf, reason: InvalidReason) -> Self {
        ImportResult {
            path,
            origin,
            is_valid: false,
            invalid_reason: Some(reason),
        }
    }

    pub(crate) fn from_health(path: PathBuf, origin: PathBuf, health: PdfHealth) -> Self {
        match health {
            PdfHealth::Valid => ImportResult::valid(path, origin),
            PdfHealth::Invalid(reason) => ImportResult::invalid(path, origin, reason),
        }
    }
}

/// Failed locations, in the order they were first encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailures {
    entries: Vec<(PathBuf, ImportError)>,
}

impl ImportFailures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure. A location already present keeps its position but
    /// takes the new error.
    pub fn insert(&mut self, path: PathBuf, error: ImportError) {
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some(entry) => entry.1 = error,
            None => self.entries.push((path, error)),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&ImportError> {
        self.entries.iter().find(|(p, _)| p == path).map(|(_, e)| e)
    }

    /// The first failure encountered.
    pub fn first(&self) -> Option<(&Path, &ImportError)> {
        self.entries.first().map(|(p, e)| (p.as_path(), e))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &ImportError)> {
        self.entries.iter().map(|(p, e)| (p.as_path(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a batch import produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub successes: Vec<ImportResult>,
    pub failures: ImportFailures,
}

/// Turns user-selected locations into importable PDFs.
///
/// Implementations must not hold any state between calls.
#[async_trait]
pub trait FileImporting: fmt::Debug + Send + Sync {
    async fn process_import(&self, paths: &[PathBuf]) -> ImportOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_keep_first_encountered_order() {
        let mut failures = ImportFailures::new();
        failures.insert(PathBuf::from("/b.txt"), ImportError::InvalidFileType);
        failures.insert(PathBuf::from("/empty"), ImportError::IsDirectoryButEmpty);
        failures.insert(PathBuf::from("/b.txt"), ImportError::Unreadable);

        assert_eq!(failures.len(), 2);
        let (path, error) = failures.first().unwrap();
        assert_eq!(path, Path::new("/b.txt"));
        assert_eq!(error, &ImportError::Unreadable);
        assert_eq!(
            failures.get(Path::new("/empty")),
            Some(&ImportError::IsDirectoryButEmpty)
        );
    }

    #[test]
    fn folder_errors_describe_their_content() {
        let deep = ImportError::DirectoryHasNoValidPdfs {
            has_subfolders: true,
            subfolders: vec![PathBuf::from("/cases/2024")],
        };
        assert!(deep.to_string().contains("subfolders"));

        let noisy = ImportError::DirectoryHasNoValidPdfs {
            has_subfolders: false,
            subfolders: vec![],
        };
        assert!(noisy.to_string().contains("none of them is a PDF"));
    }

    #[test]
    fn io_errors_map_to_permission_or_unreadable() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(ImportError::from_io(&denied), ImportError::PermissionDenied);
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(ImportError::from_io(&missing), ImportError::Unreadable);
    }
}
