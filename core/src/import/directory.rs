use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument, warn};

use super::classify::{classify, inspect_pdf, Classification};
use super::ImportResult;

/// The top level of a folder, partitioned for import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryAnalysis {
    /// Every PDF at the top level, valid or not, with the folder as origin.
    pub pdfs: Vec<ImportResult>,
    /// Visible entries of any kind, including ones that could not be inspected.
    pub total_items: usize,
    /// Regular files that are not PDFs.
    pub non_pdf_count: usize,
    pub subfolders: Vec<PathBuf>,
}

impl DirectoryAnalysis {
    pub fn has_subfolders(&self) -> bool {
        !self.subfolders.is_empty()
    }

    pub fn valid_pdfs(&self) -> impl Iterator<Item = &ImportResult> {
        self.pdfs.iter().filter(|r| r.is_valid)
    }

    pub fn zombie_pdfs(&self) -> impl Iterator<Item = &ImportResult> {
        self.pdfs.iter().filter(|r| !r.is_valid)
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Scans the top level of `folder`, skipping hidden entries.
///
/// Subfolders are listed, never entered. Entries are visited in file-name order.
/// Fails only if the folder itself cannot be listed.
#[instrument(skip(folder), fields(folder = %folder.display()))]
pub async fn analyze_directory(folder: &Path) -> std::io::Result<DirectoryAnalysis> {
    let mut read_dir = fs::read_dir(folder).await?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        if is_hidden(&entry.file_name()) {
            continue;
        }
        entries.push(entry.path());
    }
    entries.sort();
    debug!("Analyzing folder: {} visible items", entries.len());

    let mut analysis = DirectoryAnalysis {
        total_items: entries.len(),
        ..Default::default()
    };

    for path in entries {
        match classify(&path).await {
            Classification::Directory => analysis.subfolders.push(path),
            Classification::RegularFile { pdf: true, size } => {
                let health = inspect_pdf(&path, size).await;
                analysis
                    .pdfs
                    .push(ImportResult::from_health(path, folder.to_path_buf(), health));
            }
            Classification::RegularFile { pdf: false, .. } => analysis.non_pdf_count += 1,
            Classification::Unreadable(kind) => {
                warn!("Skipping {}: metadata unreadable ({:?})", path.display(), kind);
            }
        }
    }

    debug!(
        "Analysis complete: {} valid PDFs, {} zombie PDFs, {} other files, {} subfolders",
        analysis.valid_pdfs().count(),
        analysis.zombie_pdfs().count(),
        analysis.non_pdf_count,
        analysis.subfolders.len()
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::InvalidReason;
    use tempfile::tempdir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    #[tokio::test]
    async fn partitions_one_level() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b_valid.pdf"), PDF).await.unwrap();
        fs::write(root.join("a_zombie.pdf"), b"").await.unwrap();
        fs::write(root.join("notes.docx"), b"PK").await.unwrap();
        fs::write(root.join(".DS_Store"), b"junk").await.unwrap();
        fs::create_dir(root.join("2023")).await.unwrap();
        fs::write(root.join("2023").join("nested.pdf"), PDF).await.unwrap();

        let analysis = analyze_directory(root).await.unwrap();

        assert_eq!(analysis.total_items, 4);
        assert_eq!(analysis.non_pdf_count, 1);
        assert_eq!(analysis.subfolders, vec![root.join("2023")]);
        assert!(analysis.has_subfolders());

        // Sorted by name, nested PDF not included.
        let names: Vec<_> = analysis
            .pdfs
            .iter()
            .map(|r| r.path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a_zombie.pdf", "b_valid.pdf"]);

        let zombie = analysis.zombie_pdfs().next().unwrap();
        assert_eq!(zombie.invalid_reason, Some(InvalidReason::EmptyFile));
        assert_eq!(zombie.origin, root);
        assert_eq!(analysis.valid_pdfs().count(), 1);
    }

    #[tokio::test]
    async fn hidden_entries_are_not_counted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".hidden.pdf"), PDF).await.unwrap();
        fs::create_dir(dir.path().join(".git")).await.unwrap();

        let analysis = analyze_directory(dir.path()).await.unwrap();
        assert_eq!(analysis, DirectoryAnalysis::default());
    }

    #[tokio::test]
    async fn missing_folder_is_an_error() {
        let dir = tempdir().unwrap();
        let err = analyze_directory(&dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
