use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::document::DocumentStatus;

const PDF_EXTENSION: &str = "pdf";

static NUMBERED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.*\S) \((?P<n>\d+)\)$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("The new name is empty")]
    EmptyName,

    #[error("A document that is {0} cannot be renamed")]
    NotRenamable(&'static str),

    #[error("Path does not have a valid parent directory: {0}")]
    NoParentDirectory(PathBuf),

    #[error("Could not rename {} to {}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RenameError {
    fn io(from: &Path, to: &Path, source: io::Error) -> Self {
        RenameError::Io {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }
}

/// Whether a document in `status` may have its file renamed.
pub(crate) fn check_renamable(status: &DocumentStatus) -> Result<(), RenameError> {
    match status {
        DocumentStatus::Analyzing | DocumentStatus::Invalid { .. } => {
            Err(RenameError::NotRenamable(status.label()))
        }
        _ => Ok(()),
    }
}

/// Turns user input into a file stem.
///
/// Surrounding whitespace and a trailing `.pdf` (any case) are removed, and
/// path separators are replaced with `-`.
pub fn sanitize_name(raw: &str) -> Result<String, RenameError> {
    let mut name = raw.trim();
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf") {
        name = &name[..len - 4];
    }
    let name = name.replace(['/', ':'], "-");
    let name = name.trim();
    if name.is_empty() {
        return Err(RenameError::EmptyName);
    }
    Ok(name.to_string())
}

/// `dir/stem.pdf`
pub(crate) fn pdf_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{PDF_EXTENSION}"))
}

/// The first `stem (n).pdf` in `dir` that does not exist, for `n >= 2`.
///
/// A stem already ending in ` (n)` is continued from `n + 1` rather than nested.
pub async fn next_available_name(dir: &Path, stem: &str) -> String {
    let (base, mut n) = match NUMBERED_SUFFIX.captures(stem) {
        Some(caps) => {
            let n = caps["n"].parse::<u64>().map_or(2, |n| n.saturating_add(1));
            (caps["base"].to_string(), n)
        }
        None => (stem.to_string(), 2),
    };

    loop {
        let candidate = format!("{base} ({n})");
        match fs::symlink_metadata(pdf_path(dir, &candidate)).await {
            Ok(_) => n += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return candidate,
            Err(e) => {
                // Cannot tell; suggest it anyway and let the rename itself fail.
                warn!("Could not check {}: {}", candidate, e);
                return candidate;
            }
        }
    }
}

/// What renaming `current` to `target` involves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RenamePlan {
    /// Already has that path.
    Unchanged,
    /// Nothing at the target.
    Direct,
    /// The target names the same file in a different case.
    CaseOnly,
    /// Another directory entry holds the target name, even if it is a link
    /// to the same file.
    Collision,
}

pub(crate) async fn plan_rename(current: &Path, target: &Path) -> Result<RenamePlan, RenameError> {
    if current == target {
        return Ok(RenamePlan::Unchanged);
    }
    // Does not follow symlinks: a link sitting on the target name is an entry of its own.
    match fs::symlink_metadata(target).await {
        Ok(_) if differs_only_in_case(current, target) && same_file(current, target).await => {
            Ok(RenamePlan::CaseOnly)
        }
        Ok(_) => Ok(RenamePlan::Collision),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RenamePlan::Direct),
        Err(e) => Err(RenameError::io(current, target, e)),
    }
}

/// Same directory, and file names equal apart from letter case.
fn differs_only_in_case(a: &Path, b: &Path) -> bool {
    match (a.file_name(), b.file_name()) {
        (Some(x), Some(y)) => {
            a.parent() == b.parent()
                && x.to_string_lossy().to_lowercase() == y.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}

/// Moves `current` to `target` according to `plan`.
#[instrument(skip(current, target), fields(from = %current.display(), to = %target.display()))]
pub(crate) async fn execute(plan: &RenamePlan, current: &Path, target: &Path) -> Result<(), RenameError> {
    match plan {
        RenamePlan::Unchanged => Ok(()),
        RenamePlan::Direct => fs::rename(current, target)
            .await
            .map_err(|e| RenameError::io(current, target, e)),
        RenamePlan::CaseOnly => rename_via_temporary(current, target).await,
        RenamePlan::Collision => Err(RenameError::io(
            current,
            target,
            io::Error::from(io::ErrorKind::AlreadyExists),
        )),
    }
}

/// Renames in two steps through a hidden name in the same directory, so that
/// case-insensitive filesystems register a case-only change.
async fn rename_via_temporary(current: &Path, target: &Path) -> Result<(), RenameError> {
    let dir = current
        .parent()
        .ok_or_else(|| RenameError::NoParentDirectory(current.to_path_buf()))?;
    let temporary = dir.join(format!(".signum-rename-{}.{PDF_EXTENSION}", Uuid::new_v4()));

    fs::rename(current, &temporary)
        .await
        .map_err(|e| RenameError::io(current, &temporary, e))?;
    debug!("Moved to temporary {}", temporary.display());

    if let Err(e) = fs::rename(&temporary, target).await {
        warn!("Second rename step failed, restoring {}: {}", current.display(), e);
        if let Err(rollback) = fs::rename(&temporary, current).await {
            warn!(
                "Rollback failed, file left at {}: {}",
                temporary.display(),
                rollback
            );
        }
        return Err(RenameError::io(current, target, e));
    }

    // rename(2) does nothing when both names already link to one file, which
    // leaves the temporary behind.
    if fs::symlink_metadata(&temporary).await.is_ok() && same_file(&temporary, target).await {
        debug!("Removing leftover link {}", temporary.display());
        fs::remove_file(&temporary)
            .await
            .map_err(|e| RenameError::io(current, &temporary, e))?;
    }
    Ok(())
}

/// Whether both entries are the same file on disk. Symlinks are not followed,
/// so a link never counts as the file it points to.
#[cfg(unix)]
pub(crate) async fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::symlink_metadata(a).await, fs::symlink_metadata(b).await) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
pub(crate) async fn same_file(a: &Path, b: &Path) -> bool {
    let is_link = |m: &std::fs::Metadata| m.file_type().is_symlink();
    match (fs::symlink_metadata(a).await, fs::symlink_metadata(b).await) {
        (Ok(ma), Ok(mb)) if !is_link(&ma) && !is_link(&mb) => {
            match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
                (Ok(a), Ok(b)) => {
                    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
                }
                _ => false,
            }
        }
        _ => false,
    }
}
