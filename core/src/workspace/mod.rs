//! The review workspace: the documents a user is working through in one session.
//!
//! A [`Workspace`] is the single owner of
//!
//! *   the imported [`Document`]s, in import order, at most one per resolved path;
//! *   the current selection;
//! *   batch-analysis progress and the importing / processing flags;
//! *   the latest [`ImportAlert`];
//! *   the [`AccessGrants`] for every root a document was imported through.
//!
//! All state sits behind one async mutex. Long-running steps (the import scan and
//! the analysis delay) run with the lock released and re-acquire it to apply
//! their results, so readers such as [`Workspace::documents`] never wait on I/O.
//!
//! # Lifecycle of a document
//!
//! ```text
//! add_files ──► pending ──► analyzing ──► needs_review ──► verified ◄──► renamed
//!                  ▲  └────────┴── error ───┘                ▲
//!                  └─────────────────┘ (retry)               │
//!              invalid (zombie, never leaves)     finalize_and_rename_document
//! ```
//!
//! Front-ends observe changes through the listener lists in [`Workspace::on`].
//! Listeners are called after the state lock is released.
//!
//! # Renaming
//!
//! [`Workspace::finalize_and_rename_document`] never overwrites a file. When the
//! requested name belongs to a different file it returns
//! [`RenameOutcome::NeedsConfirmation`] with a free suffixed name, and the caller
//! decides whether to go ahead via [`Workspace::confirm_rename`].

mod alert;
mod rename;

pub use self::alert::{ActionStyle, AlertAction, AlertActionKind, DuplicateNamePrompt, ImportAlert};
pub use self::rename::{next_available_name, sanitize_name, RenameError};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use self::rename::{check_renamable, execute, pdf_path, plan_rename, RenamePlan};
use crate::access::{AccessGrants, AccessGuard};
use crate::config::WorkspaceSettings;
use crate::document::{Document, DocumentStatus, ExtractedMetadata};
use crate::event::{define_event_listeners, Event};
use crate::import::{FileImporting, ImportFailures};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("An import is already in progress")]
    ImportInProgress,

    #[error("Batch processing is already running")]
    ProcessingInProgress,

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("A document that is {from} cannot become {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

/// What one call to [`Workspace::add_files`] did.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// Documents appended to the workspace.
    pub added: usize,
    /// PDFs skipped because the workspace already had them.
    pub duplicates: usize,
    pub failures: ImportFailures,
    pub alert: Option<ImportAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file now lives at `path`.
    Renamed { path: PathBuf },
    /// The document already had that name; it was only marked verified.
    Unchanged,
    /// The name is taken by another file. Nothing was moved.
    NeedsConfirmation(DuplicateNamePrompt),
}

// Events

#[derive(Debug, Clone)]
pub struct DocumentsChanged {
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct SelectionChanged {
    pub selected: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct StatusChanged {
    pub id: Uuid,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone)]
pub struct ProgressChanged {
    /// Fraction of the batch completed, `0.0..=1.0`.
    pub progress: f64,
}

#[derive(Debug, Clone)]
pub struct AlertRaised {
    pub alert: ImportAlert,
}

impl Event for DocumentsChanged {}

impl Event for SelectionChanged {}

impl Event for StatusChanged {}

impl Event for ProgressChanged {}

impl Event for AlertRaised {}

define_event_listeners!(WorkspaceEvents {
    documents_changed: DocumentsChanged,
    selection_changed: SelectionChanged,
    status_changed: StatusChanged,
    progress_changed: ProgressChanged,
    alert_raised: AlertRaised,
});

/// Set while an operation runs; cleared on drop, including on early return.
struct BusyFlag<'a>(&'a AtomicBool);

impl<'a> BusyFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyFlag(flag))
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct WorkspaceState {
    documents: Vec<Document>,
    selected: Option<Uuid>,
    grants: AccessGrants,
    progress: f64,
    alert: Option<ImportAlert>,
}

impl WorkspaceState {
    fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id() == id)
    }

    fn document_mut(&mut self, id: Uuid) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id() == id)
    }

    /// Moves the selection to the first document still waiting on the user.
    /// Leaves it alone if there is none.
    fn select_next_pending(&mut self) -> bool {
        match self.documents.iter().find(|d| d.status().awaits_review()) {
            Some(next) if self.selected != Some(next.id()) => {
                self.selected = Some(next.id());
                true
            }
            _ => false,
        }
    }
}

/// Fixed metadata reported by the analysis step until real extraction exists.
fn placeholder_analysis() -> ExtractedMetadata {
    ExtractedMetadata {
        document_type: Some("TEST DOCUMENT".to_string()),
        case_number: Some("123/2024".to_string()),
        selected_notice: None,
    }
}

#[derive(Debug)]
pub struct Workspace {
    importer: Arc<dyn FileImporting>,
    settings: WorkspaceSettings,
    state: Mutex<WorkspaceState>,
    importing: AtomicBool,
    processing: AtomicBool,
    pub on: WorkspaceEvents,
}

impl Workspace {
    pub fn new(
        importer: Arc<dyn FileImporting>,
        access: Arc<dyn AccessGuard>,
        settings: WorkspaceSettings,
    ) -> Self {
        Workspace {
            importer,
            settings,
            state: Mutex::new(WorkspaceState {
                documents: Vec::new(),
                selected: None,
                grants: AccessGrants::new(access),
                progress: 0.0,
                alert: None,
            }),
            importing: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            on: WorkspaceEvents::new(),
        }
    }

    // Queries

    /// A snapshot of all documents, in import order.
    pub async fn documents(&self) -> Vec<Document> {
        self.state.lock().await.documents.clone()
    }

    pub async fn document(&self, id: Uuid) -> Option<Document> {
        self.state.lock().await.document(id).cloned()
    }

    pub async fn selected_document(&self) -> Option<Document> {
        let state = self.state.lock().await;
        state.selected.and_then(|id| state.document(id).cloned())
    }

    pub async fn progress(&self) -> f64 {
        self.state.lock().await.progress
    }

    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::Acquire)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn alert(&self) -> Option<ImportAlert> {
        self.state.lock().await.alert.clone()
    }

    pub async fn dismiss_alert(&self) {
        self.state.lock().await.alert = None;
    }

    /// Roots for which an access grant is currently held.
    pub async fn held_grants(&self) -> Vec<PathBuf> {
        let state = self.state.lock().await;
        state.grants.roots().map(Path::to_path_buf).collect()
    }

    // Mutations

    /// Imports `paths` and appends every PDF not already in the workspace.
    ///
    /// Only one import runs at a time; a second call while one is in flight
    /// fails with [`WorkspaceError::ImportInProgress`] instead of queueing.
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn add_files(&self, paths: &[PathBuf]) -> Result<ImportSummary, WorkspaceError> {
        let _busy = BusyFlag::acquire(&self.importing).ok_or(WorkspaceError::ImportInProgress)?;

        let outcome = self.importer.process_import(paths).await;

        let mut state = self.state.lock().await;
        let mut summary = ImportSummary::default();
        let mut new_statuses = Vec::new();

        for result in &outcome.successes {
            if state.documents.iter().any(|d| d.path() == result.path) {
                debug!("Already in workspace: {}", result.path.display());
                summary.duplicates += 1;
                continue;
            }
            state.grants.ensure(&result.origin);
            let document = Document::from_import(result);
            new_statuses.push((document.id(), document.status().clone()));
            state.documents.push(document);
            summary.added += 1;
        }

        let mut selection_changed = false;
        if state.selected.is_none() {
            state.selected = state.documents.first().map(Document::id);
            selection_changed = state.selected.is_some();
        }

        summary.alert = ImportAlert::for_failures(&outcome.failures, summary.added);
        if summary.alert.is_some() {
            warn!("Import finished with {} failures", outcome.failures.len());
            state.alert = summary.alert.clone();
        } else if summary.added > 0 {
            state.alert = None;
        }
        summary.failures = outcome.failures;

        let count = state.documents.len();
        let selected = state.selected;
        drop(state);

        info!("Added {} documents ({} already present)", summary.added, summary.duplicates);
        if summary.added > 0 {
            self.on.documents_changed.dispatch(&DocumentsChanged { count });
        }
        for (id, status) in new_statuses {
            self.on.status_changed.dispatch(&StatusChanged { id, status });
        }
        if selection_changed {
            self.on.selection_changed.dispatch(&SelectionChanged { selected });
        }
        if let Some(alert) = &summary.alert {
            self.on.alert_raised.dispatch(&AlertRaised { alert: alert.clone() });
        }
        Ok(summary)
    }

    /// Removes a document, releasing its root's grant if nothing else uses it.
    pub async fn remove_document(&self, id: Uuid) -> Result<Document, WorkspaceError> {
        let mut state = self.state.lock().await;
        let index = state
            .documents
            .iter()
            .position(|d| d.id() == id)
            .ok_or(WorkspaceError::DocumentNotFound(id))?;
        let removed = state.documents.remove(index);

        let selection_cleared = state.selected == Some(id);
        if selection_cleared {
            state.selected = None;
        }
        if !state.documents.iter().any(|d| d.origin() == removed.origin()) {
            state.grants.release(removed.origin());
        }
        let count = state.documents.len();
        drop(state);

        debug!("Removed {}", removed.path().display());
        self.on.documents_changed.dispatch(&DocumentsChanged { count });
        if selection_cleared {
            self.on.selection_changed.dispatch(&SelectionChanged { selected: None });
        }
        Ok(removed)
    }

    pub async fn select(&self, id: Uuid) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        if state.document(id).is_none() {
            return Err(WorkspaceError::DocumentNotFound(id));
        }
        let changed = state.selected.replace(id) != Some(id);
        drop(state);

        if changed {
            self.on.selection_changed.dispatch(&SelectionChanged { selected: Some(id) });
        }
        Ok(())
    }

    /// Analyzes every `pending` or `error` document, one after another.
    ///
    /// The set of documents is fixed when the call starts. Documents removed
    /// while the batch runs are skipped.
    #[instrument(skip(self))]
    pub async fn start_batch_processing(&self) -> Result<(), WorkspaceError> {
        let _busy =
            BusyFlag::acquire(&self.processing).ok_or(WorkspaceError::ProcessingInProgress)?;

        let queue: Vec<Uuid> = {
            let mut state = self.state.lock().await;
            state.progress = 0.0;
            state
                .documents
                .iter()
                .filter(|d| d.status().is_processable())
                .map(Document::id)
                .collect()
        };
        let total = queue.len();
        info!("Analyzing {} documents", total);
        self.set_progress(0.0).await;

        for (done, id) in queue.into_iter().enumerate() {
            if self.transition(id, DocumentStatus::Analyzing).await {
                tokio::time::sleep(self.settings.analysis_delay).await;
                self.finish_analysis(id, placeholder_analysis()).await;
            } else {
                debug!("Skipping {}: no longer queued", id);
            }
            self.set_progress((done + 1) as f64 / total as f64).await;
        }

        self.set_progress(1.0).await;
        info!("Batch processing finished");
        Ok(())
    }

    /// Moves `id` to `next` if the document still exists and allows it.
    async fn transition(&self, id: Uuid, next: DocumentStatus) -> bool {
        let mut state = self.state.lock().await;
        let Some(document) = state.document_mut(id) else {
            return false;
        };
        if !document.status().allows(&next) {
            return false;
        }
        document.status = next.clone();
        drop(state);

        self.on.status_changed.dispatch(&StatusChanged { id, status: next });
        true
    }

    async fn finish_analysis(&self, id: Uuid, metadata: ExtractedMetadata) {
        let mut state = self.state.lock().await;
        let Some(document) = state.document_mut(id) else {
            debug!("Document {} removed during analysis", id);
            return;
        };
        if document.status() != &DocumentStatus::Analyzing {
            return;
        }
        document.suggested_name = metadata.suggested_name();
        document.metadata = metadata;
        document.status = DocumentStatus::NeedsReview;
        drop(state);

        self.on.status_changed.dispatch(&StatusChanged {
            id,
            status: DocumentStatus::NeedsReview,
        });
    }

    async fn set_progress(&self, progress: f64) {
        self.state.lock().await.progress = progress;
        self.on.progress_changed.dispatch(&ProgressChanged { progress });
    }

    /// Records the name the user settled on and marks the document verified,
    /// without touching the file.
    pub async fn verify_document(&self, id: Uuid, edited_name: &str) -> Result<(), WorkspaceError> {
        let mut state = self.state.lock().await;
        let document = state
            .document_mut(id)
            .ok_or(WorkspaceError::DocumentNotFound(id))?;
        if !document.status().allows(&DocumentStatus::Verified) {
            return Err(WorkspaceError::InvalidTransition {
                from: document.status().label(),
                to: DocumentStatus::Verified.label(),
            });
        }
        document.edited_name = edited_name.to_string();
        document.status = DocumentStatus::Verified;
        let selection_changed = state.select_next_pending();
        let selected = state.selected;
        drop(state);

        self.on.status_changed.dispatch(&StatusChanged {
            id,
            status: DocumentStatus::Verified,
        });
        if selection_changed {
            self.on.selection_changed.dispatch(&SelectionChanged { selected });
        }
        Ok(())
    }

    /// Renames the document's file to `new_name` (sanitized, `.pdf` appended)
    /// in its current folder and marks it verified.
    #[instrument(skip(self, new_name))]
    pub async fn finalize_and_rename_document(
        &self,
        id: Uuid,
        new_name: &str,
    ) -> Result<RenameOutcome, RenameError> {
        let stem = sanitize_name(new_name)?;

        let current = {
            let state = self.state.lock().await;
            let document = state.document(id).ok_or(RenameError::DocumentNotFound(id))?;
            check_renamable(document.status())?;
            document.path().to_path_buf()
        };
        let dir = current
            .parent()
            .ok_or_else(|| RenameError::NoParentDirectory(current.clone()))?;
        let target = pdf_path(dir, &stem);

        let plan = plan_rename(&current, &target).await?;
        if plan == RenamePlan::Collision {
            let suggested_name = next_available_name(dir, &stem).await;
            debug!("{} is taken, suggesting {}", target.display(), suggested_name);
            return Ok(RenameOutcome::NeedsConfirmation(DuplicateNamePrompt {
                document_id: id,
                requested_name: stem,
                suggested_name,
                conflicting_path: target,
            }));
        }

        execute(&plan, &current, &target).await?;
        if plan != RenamePlan::Unchanged {
            info!("Renamed {} to {}", current.display(), target.display());
        }
        self.commit_rename(id, target, plan).await
    }

    /// Accepts the suggested name from a [`DuplicateNamePrompt`].
    pub async fn confirm_rename(
        &self,
        prompt: &DuplicateNamePrompt,
    ) -> Result<RenameOutcome, RenameError> {
        self.finalize_and_rename_document(prompt.document_id, &prompt.suggested_name)
            .await
    }

    async fn commit_rename(
        &self,
        id: Uuid,
        target: PathBuf,
        plan: RenamePlan,
    ) -> Result<RenameOutcome, RenameError> {
        let mut state = self.state.lock().await;
        let Some(document) = state.document_mut(id) else {
            warn!("Document {} was removed while its file was being renamed", id);
            return Err(RenameError::DocumentNotFound(id));
        };
        document.edited_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        document.set_path(target.clone());
        let verified = document.status().allows(&DocumentStatus::Verified);
        if verified {
            document.status = DocumentStatus::Verified;
        }
        let selection_changed = state.select_next_pending();
        let selected = state.selected;
        drop(state);

        if verified {
            self.on.status_changed.dispatch(&StatusChanged {
                id,
                status: DocumentStatus::Verified,
            });
        }
        if selection_changed {
            self.on.selection_changed.dispatch(&SelectionChanged { selected });
        }

        Ok(match plan {
            RenamePlan::Unchanged => RenameOutcome::Unchanged,
            _ => RenameOutcome::Renamed { path: target },
        })
    }

    /// Empties the workspace and releases every held grant.
    ///
    /// The importing and processing flags are reset unconditionally. An
    /// `add_files` still in flight therefore appends its results after the
    /// clear, and a new import or batch may start alongside the old one.
    /// A batch still running skips the documents that are gone.
    pub async fn clear_workspace(&self) {
        let mut state = self.state.lock().await;
        state.selected = None;
        state.grants.release_all();
        state.documents.clear();
        state.progress = 0.0;
        state.alert = None;
        self.importing.store(false, Ordering::Release);
        self.processing.store(false, Ordering::Release);
        drop(state);

        info!("Workspace cleared");
        self.on.selection_changed.dispatch(&SelectionChanged { selected: None });
        self.on.documents_changed.dispatch(&DocumentsChanged { count: 0 });
        self.on.progress_changed.dispatch(&ProgressChanged { progress: 0.0 });
    }
}
