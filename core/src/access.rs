//! Scoped access grants for user-selected filesystem roots.
//!
//! On sandboxed platforms a file or folder picked by the user may only be read or
//! written while an explicit grant for it is held. [`AccessGuard`] abstracts that
//! mechanism: the import pipeline holds a short-lived [`ScopedAccess`] while it
//! scans a location, and the workspace keeps durable grants in [`AccessGrants`] for
//! every root its documents came from, so they can still be renamed later.
//!
//! Failing to acquire a grant is never fatal. Drag-and-drop sources, for example,
//! often arrive already accessible; callers log the failure and carry on.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace, warn};

/// Acquires and releases access grants for filesystem roots.
pub trait AccessGuard: fmt::Debug + Send + Sync {
    /// Attempts to obtain a read/write grant on `root`. Returns whether it succeeded.
    ///
    /// Synchronous, and the workspace calls it while holding its state lock, so
    /// implementations must return promptly.
    fn acquire(&self, root: &Path) -> bool;

    /// Gives up a grant previously obtained with [`acquire`](Self::acquire).
    fn release(&self, root: &Path);
}

/// Grants backed by plain filesystem permissions.
///
/// There is no token to hold on a non-sandboxed system, so a grant "succeeds" when
/// the root's metadata can be read, and releasing it does nothing. That check is
/// a single blocking `stat` call.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemAccess;

impl AccessGuard for FilesystemAccess {
    fn acquire(&self, root: &Path) -> bool {
        match std::fs::metadata(root) {
            Ok(_) => {
                trace!("Access granted for {}", root.display());
                true
            }
            Err(e) => {
                warn!("Could not obtain access to {}: {}", root.display(), e);
                false
            }
        }
    }

    fn release(&self, root: &Path) {
        trace!("Access released for {}", root.display());
    }
}

/// A grant held for the lifetime of this value.
///
/// Released on drop, but only if it was actually acquired.
#[must_use = "the grant is released as soon as the scope is dropped"]
pub struct ScopedAccess<'a> {
    guard: &'a dyn AccessGuard,
    root: PathBuf,
    granted: bool,
}

impl<'a> ScopedAccess<'a> {
    pub fn acquire(guard: &'a dyn AccessGuard, root: &Path) -> Self {
        let granted = guard.acquire(root);
        if !granted {
            debug!("Continuing without an access grant for {}", root.display());
        }
        ScopedAccess {
            guard,
            root: root.to_path_buf(),
            granted,
        }
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }
}

impl Drop for ScopedAccess<'_> {
    fn drop(&mut self) {
        if self.granted {
            self.guard.release(&self.root);
        }
    }
}

/// The set of roots for which the workspace holds a durable grant.
///
/// Every root in the set is released exactly once: by [`release`](Self::release),
/// [`release_all`](Self::release_all), or when the set is dropped.
#[derive(Debug)]
pub struct AccessGrants {
    guard: Arc<dyn AccessGuard>,
    held: BTreeSet<PathBuf>,
}

impl AccessGrants {
    pub fn new(guard: Arc<dyn AccessGuard>) -> Self {
        AccessGrants {
            guard,
            held: BTreeSet::new(),
        }
    }

    /// Acquires a grant for `root` unless one is already held.
    ///
    /// Returns `true` if a grant is held for `root` afterwards.
    pub fn ensure(&mut self, root: &Path) -> bool {
        if self.held.contains(root) {
            return true;
        }
        if self.guard.acquire(root) {
            debug!("Holding access grant for {}", root.display());
            self.held.insert(root.to_path_buf());
            true
        } else {
            warn!("No durable access grant for {}; renames inside it may fail", root.display());
            false
        }
    }

    pub fn is_held(&self, root: &Path) -> bool {
        self.held.contains(root)
    }

    /// Releases the grant for `root`, if one is held.
    pub fn release(&mut self, root: &Path) -> bool {
        if self.held.remove(root) {
            self.guard.release(root);
            debug!("Released access grant for {}", root.display());
            true
        } else {
            false
        }
    }

    pub fn release_all(&mut self) {
        for root in std::mem::take(&mut self.held) {
            self.guard.release(&root);
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.held.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Drop for AccessGrants {
    fn drop(&mut self) {
        self.release_all();
    }
}
