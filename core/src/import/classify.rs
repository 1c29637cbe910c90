use std::path::Path;

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use super::InvalidReason;

/// PDF readers accept the header anywhere in the first kilobyte.
const HEADER_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

/// What a filesystem entry is, as far as importing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    RegularFile { pdf: bool, size: u64 },
    Directory,
    /// Metadata could not be read.
    Unreadable(std::io::ErrorKind),
}

/// Whether a PDF can actually be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfHealth {
    Valid,
    Invalid(InvalidReason),
}

/// Whether `path` names a PDF, judged by its type (derived from the extension).
pub fn is_pdf_path(path: &Path) -> bool {
    mime_guess::from_path(path)
        .iter()
        .any(|m| m == mime::APPLICATION_PDF)
}

/// Classifies the entry at `path`, following symlinks.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub async fn classify(path: &Path) -> Classification {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Classification::Directory,
        Ok(meta) => Classification::RegularFile {
            pdf: is_pdf_path(path),
            size: meta.len(),
        },
        Err(e) => {
            debug!("Cannot read metadata: {}", e);
            Classification::Unreadable(e.kind())
        }
    }
}

/// Decides whether a PDF of the given `size` is usable.
///
/// Zero bytes makes it an empty "zombie" file. Otherwise the `%PDF-` header must
/// appear within the first kilobyte, or the file is treated as corrupted.
pub async fn inspect_pdf(path: &Path, size: u64) -> PdfHealth {
    if size == 0 {
        warn!("Zombie PDF (0 bytes): {}", path.display());
        return PdfHealth::Invalid(InvalidReason::EmptyFile);
    }

    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Cannot open {} for reading: {}", path.display(), e);
            return PdfHealth::Invalid(InvalidReason::ReadPermission);
        }
    };

    let mut head = Vec::with_capacity(HEADER_WINDOW);
    let mut buf = [0u8; 256];
    while head.len() < HEADER_WINDOW {
        match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
            Err(e) => {
                warn!("Failed reading {}: {}", path.display(), e);
                return PdfHealth::Invalid(InvalidReason::ReadPermission);
            }
        }
    }
    head.truncate(HEADER_WINDOW);

    if head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        PdfHealth::Valid
    } else {
        warn!("No PDF header in {}", path.display());
        PdfHealth::Invalid(InvalidReason::Corrupted)
    }
}
