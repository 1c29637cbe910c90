use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::{tempdir, TempDir};
use tokio::fs;

use signum_core::access::{AccessGuard, FilesystemAccess};
use signum_core::config::WorkspaceSettings;
use signum_core::event::Listener;
use signum_core::import::{FileImportService, ImportError};
use signum_core::workspace::{
    AlertActionKind, DuplicateNamePrompt, RenameError, SelectionChanged, StatusChanged,
};
use signum_core::{DocumentStatus, RenameOutcome, Workspace};

const PDF: &[u8] = b"%PDF-1.7\n%%EOF\n";

/// Grants everything and records the order of acquire/release calls.
#[derive(Debug, Default)]
struct RecordingAccess {
    calls: Mutex<Vec<String>>,
}

impl AccessGuard for RecordingAccess {
    fn acquire(&self, root: &Path) -> bool {
        self.calls.lock().unwrap().push(format!("+{}", root.display()));
        true
    }

    fn release(&self, root: &Path) {
        self.calls.lock().unwrap().push(format!("-{}", root.display()));
    }
}

impl RecordingAccess {
    fn count(&self, prefix: char, root: &Path) -> usize {
        let needle = format!("{prefix}{}", root.display());
        self.calls.lock().unwrap().iter().filter(|c| **c == needle).count()
    }
}

fn workspace() -> Workspace {
    Workspace::new(
        Arc::new(FileImportService::default()),
        Arc::new(FilesystemAccess),
        WorkspaceSettings::immediate(),
    )
}

/// A canonical temp folder with the given PDFs in it.
async fn folder_with(names: &[&str]) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).await.unwrap();
    for name in names {
        fs::write(root.join(name), PDF).await.unwrap();
    }
    (dir, root)
}

/// File names in `dir`, sorted.
async fn entries(dir: &Path) -> Vec<String> {
    let mut listing = fs::read_dir(dir).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = listing.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

async fn expect_prompt(ws: &Workspace, id: uuid::Uuid, name: &str) -> DuplicateNamePrompt {
    match ws.finalize_and_rename_document(id, name).await.unwrap() {
        RenameOutcome::NeedsConfirmation(prompt) => prompt,
        other => panic!("expected a prompt, got {:?}", other),
    }
}

#[tokio::test]
async fn renaming_to_the_same_name_only_verifies() {
    let (_dir, root) = folder_with(&["Report.pdf"]).await;
    let ws = workspace();
    ws.add_files(&[root.join("Report.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let outcome = ws.finalize_and_rename_document(id, "Report").await.unwrap();

    assert_eq!(outcome, RenameOutcome::Unchanged);
    let doc = ws.document(id).await.unwrap();
    assert_eq!(doc.status(), &DocumentStatus::Verified);
    assert_eq!(doc.path(), root.join("Report.pdf"));
    assert!(fs::try_exists(root.join("Report.pdf")).await.unwrap());
}

#[tokio::test]
async fn rename_moves_the_file_and_updates_the_document() {
    let (_dir, root) = folder_with(&["scan_0001.pdf"]).await;
    let ws = workspace();
    ws.add_files(&[root.clone()]).await.unwrap();
    let id = ws.documents().await[0].id();

    let outcome = ws
        .finalize_and_rename_document(id, "  Amparo 973/2024.pdf ")
        .await
        .unwrap();

    let expected = root.join("Amparo 973-2024.pdf");
    assert_eq!(outcome, RenameOutcome::Renamed { path: expected.clone() });
    assert!(fs::try_exists(&expected).await.unwrap());
    assert!(!fs::try_exists(root.join("scan_0001.pdf")).await.unwrap());

    let doc = ws.document(id).await.unwrap();
    assert_eq!(doc.path(), expected);
    assert_eq!(doc.edited_name, "Amparo 973-2024.pdf");
    assert_eq!(doc.original_file_name(), "scan_0001.pdf");
    assert_eq!(doc.status(), &DocumentStatus::Verified);
}

#[tokio::test]
async fn collisions_suggest_numbered_names() {
    let (_dir, root) = folder_with(&["Report.pdf", "a.pdf", "b.pdf"]).await;
    let ws = workspace();
    ws.add_files(&[root.join("a.pdf"), root.join("b.pdf")]).await.unwrap();
    let docs = ws.documents().await;

    let prompt = expect_prompt(&ws, docs[0].id(), "Report").await;
    assert_eq!(prompt.suggested_name, "Report (2)");
    assert_eq!(prompt.conflicting_path, root.join("Report.pdf"));
    // Nothing moved yet.
    assert!(fs::try_exists(root.join("a.pdf")).await.unwrap());

    ws.confirm_rename(&prompt).await.unwrap();
    assert!(fs::try_exists(root.join("Report (2).pdf")).await.unwrap());

    let second = expect_prompt(&ws, docs[1].id(), "Report").await;
    assert_eq!(second.suggested_name, "Report (3)");
}

#[tokio::test]
async fn case_change_of_a_plain_file() {
    let (_dir, root) = folder_with(&["report.pdf"]).await;
    let ws = workspace();
    ws.add_files(&[root.join("report.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let outcome = ws.finalize_and_rename_document(id, "Report").await.unwrap();

    assert_eq!(outcome, RenameOutcome::Renamed { path: root.join("Report.pdf") });
    assert_eq!(entries(&root).await, vec!["Report.pdf"]);
}

#[tokio::test]
async fn case_only_rename_when_both_spellings_name_the_file() {
    let (_dir, root) = folder_with(&["report.pdf"]).await;
    // Gives the file its second spelling where case matters; where it does
    // not, that spelling already resolves to the file.
    match fs::hard_link(root.join("report.pdf"), root.join("Report.pdf")).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => panic!("could not link: {e}"),
    }
    let ws = workspace();
    ws.add_files(&[root.join("report.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let outcome = ws.finalize_and_rename_document(id, "Report").await.unwrap();

    assert_eq!(outcome, RenameOutcome::Renamed { path: root.join("Report.pdf") });
    assert_eq!(entries(&root).await, vec!["Report.pdf"]);
    assert_eq!(fs::read(root.join("Report.pdf")).await.unwrap(), PDF);
    let doc = ws.document(id).await.unwrap();
    assert_eq!(doc.path(), root.join("Report.pdf"));
    assert_eq!(doc.status(), &DocumentStatus::Verified);
}

#[tokio::test]
async fn hard_link_holding_the_name_is_a_collision() {
    let (_dir, root) = folder_with(&["a.pdf"]).await;
    fs::hard_link(root.join("a.pdf"), root.join("Report.pdf")).await.unwrap();
    let ws = workspace();
    ws.add_files(&[root.join("a.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let prompt = expect_prompt(&ws, id, "Report").await;

    assert_eq!(prompt.suggested_name, "Report (2)");
    assert_eq!(prompt.conflicting_path, root.join("Report.pdf"));
    assert_eq!(entries(&root).await, vec!["Report.pdf", "a.pdf"]);
    assert_eq!(ws.document(id).await.unwrap().status(), &DocumentStatus::Pending);

    ws.confirm_rename(&prompt).await.unwrap();
    assert_eq!(entries(&root).await, vec!["Report (2).pdf", "Report.pdf"]);
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_holding_the_name_is_a_collision() {
    let (_dir, root) = folder_with(&["a.pdf"]).await;
    fs::symlink(root.join("a.pdf"), root.join("Report.pdf")).await.unwrap();
    let ws = workspace();
    ws.add_files(&[root.join("a.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let prompt = expect_prompt(&ws, id, "Report").await;

    assert_eq!(prompt.suggested_name, "Report (2)");
    let link = fs::symlink_metadata(root.join("Report.pdf")).await.unwrap();
    assert!(link.file_type().is_symlink());
    assert_eq!(entries(&root).await, vec!["Report.pdf", "a.pdf"]);
}

#[cfg(unix)]
#[tokio::test]
async fn dangling_symlink_is_skipped_when_suggesting() {
    let (_dir, root) = folder_with(&["a.pdf", "Report.pdf"]).await;
    fs::symlink(root.join("gone.pdf"), root.join("Report (2).pdf")).await.unwrap();
    let ws = workspace();
    ws.add_files(&[root.join("a.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    let prompt = expect_prompt(&ws, id, "Report").await;
    assert_eq!(prompt.suggested_name, "Report (3)");
}

#[tokio::test]
async fn failed_rename_changes_nothing() {
    let (_dir, root) = folder_with(&["a.pdf"]).await;
    let ws = workspace();
    ws.add_files(&[root.join("a.pdf")]).await.unwrap();
    let id = ws.documents().await[0].id();

    // The file disappears behind the workspace's back.
    fs::remove_file(root.join("a.pdf")).await.unwrap();
    let err = ws.finalize_and_rename_document(id, "b").await.unwrap_err();

    assert!(matches!(err, RenameError::Io { .. }));
    let doc = ws.document(id).await.unwrap();
    assert_eq!(doc.path(), root.join("a.pdf"));
    assert_eq!(doc.status(), &DocumentStatus::Pending);
}

#[tokio::test]
async fn zombies_cannot_be_renamed() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).await.unwrap();
    fs::write(root.join("empty.pdf"), b"").await.unwrap();
    let ws = workspace();
    ws.add_files(&[root.clone()]).await.unwrap();
    let id = ws.documents().await[0].id();

    let err = ws.finalize_and_rename_document(id, "anything").await.unwrap_err();
    assert!(matches!(err, RenameError::NotRenamable("invalid")));
    assert!(matches!(
        ws.finalize_and_rename_document(id, "   ").await,
        Err(RenameError::EmptyName)
    ));
}

#[tokio::test]
async fn batch_processing_reviews_everything_retryable() {
    let (_dir, root) = folder_with(&["a.pdf", "b.pdf", "c.pdf"]).await;
    fs::write(root.join("zombie.pdf"), b"").await.unwrap();
    let ws = workspace();
    ws.add_files(&[root.clone()]).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _listener = Listener::new(&ws.on.status_changed, move |e: &StatusChanged| {
        sink.lock().unwrap().push(e.status.label());
    });

    ws.start_batch_processing().await.unwrap();

    let docs = ws.documents().await;
    let (zombies, valid): (Vec<_>, Vec<_>) = docs.iter().partition(|d| !d.is_valid());
    assert_eq!(zombies.len(), 1);
    assert!(valid.iter().all(|d| d.status() == &DocumentStatus::NeedsReview));
    assert_eq!(ws.progress().await, 1.0);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "analyzing", "needs review", "analyzing", "needs review", "analyzing",
            "needs review",
        ]
    );
}

#[tokio::test]
async fn subfolder_only_import_offers_exploration() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).await.unwrap();
    for year in ["2022", "2023", "2024", "2025"] {
        fs::create_dir(root.join(year)).await.unwrap();
        fs::write(root.join(year).join("filing.pdf"), PDF).await.unwrap();
    }
    let ws = workspace();

    let summary = ws.add_files(&[root.clone()]).await.unwrap();

    assert_eq!(summary.added, 0);
    assert!(matches!(
        summary.failures.get(&root),
        Some(ImportError::DirectoryHasNoValidPdfs { has_subfolders: true, .. })
    ));
    let alert = summary.alert.unwrap();
    assert!(alert.message.contains("2022, 2023, 2024 and 1 more"));
    let paths = match &alert.actions[1].kind {
        AlertActionKind::ExploreSubfolders { paths } => paths.clone(),
        other => panic!("unexpected action {:?}", other),
    };
    assert_eq!(paths.len(), 4);

    // Exploring one subfolder imports its PDF.
    let explored = ws.add_files(&paths[..1]).await.unwrap();
    assert_eq!(explored.added, 1);
    assert_eq!(explored.alert, None);
}

#[tokio::test]
async fn grants_follow_the_documents() {
    let (_dir, root) = folder_with(&["a.pdf", "b.pdf"]).await;
    let access = Arc::new(RecordingAccess::default());
    let ws = Workspace::new(
        Arc::new(FileImportService::default()),
        access.clone(),
        WorkspaceSettings::immediate(),
    );

    ws.add_files(&[root.clone()]).await.unwrap();
    assert_eq!(ws.held_grants().await, vec![root.clone()]);
    assert_eq!(access.count('+', &root), 1);

    let docs = ws.documents().await;
    ws.remove_document(docs[0].id()).await.unwrap();
    assert_eq!(access.count('-', &root), 0);

    ws.remove_document(docs[1].id()).await.unwrap();
    assert_eq!(access.count('-', &root), 1);
    assert!(ws.held_grants().await.is_empty());
}

#[tokio::test]
async fn clearing_releases_grants_and_resets_state() {
    let (_dir, root) = folder_with(&["a.pdf"]).await;
    let access = Arc::new(RecordingAccess::default());
    let ws = Workspace::new(
        Arc::new(FileImportService::default()),
        access.clone(),
        WorkspaceSettings::immediate(),
    );
    ws.add_files(&[root.clone()]).await.unwrap();
    ws.start_batch_processing().await.unwrap();

    let selections = Arc::new(Mutex::new(Vec::new()));
    let sink = selections.clone();
    let _listener = Listener::new(&ws.on.selection_changed, move |e: &SelectionChanged| {
        sink.lock().unwrap().push(e.selected);
    });

    ws.clear_workspace().await;

    assert!(ws.documents().await.is_empty());
    assert!(ws.selected_document().await.is_none());
    assert_eq!(ws.progress().await, 0.0);
    assert_eq!(ws.alert().await, None);
    assert_eq!(access.count('-', &root), 1);
    assert_eq!(*selections.lock().unwrap(), vec![None]);

    drop(ws);
    // Already released by the clear; dropping does not release again.
    assert_eq!(access.count('-', &root), 1);
}

#[tokio::test]
async fn dropping_the_workspace_releases_grants() {
    let (_dir, root) = folder_with(&["a.pdf"]).await;
    let access = Arc::new(RecordingAccess::default());
    {
        let ws = Workspace::new(
            Arc::new(FileImportService::default()),
            access.clone(),
            WorkspaceSettings::immediate(),
        );
        ws.add_files(&[root.clone()]).await.unwrap();
    }
    assert_eq!(access.count('-', &root), 1);
}
