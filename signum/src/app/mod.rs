use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use console::{style, Term};
use signum_core::access::FilesystemAccess;
use signum_core::event::Listener;
use signum_core::import::FileImportService;
use signum_core::workspace::{ImportAlert, ImportSummary, ProgressChanged};
use signum_core::{Document, DocumentStatus, Workspace};
use tracing::debug;

use crate::AppContext;

mod review;
pub use review::{confirm, pick_subfolder, prompt_name, review};

/// Alert and listing text wraps at this width on wide terminals.
const MAX_WIDTH: usize = 100;

/// The terminal front-end's view of one workspace session.
pub struct Signum {
    pub workspace: Arc<Workspace>,
    pub interactive: bool,
}

impl Signum {
    pub fn new(cx: &AppContext) -> Self {
        let workspace = Workspace::new(
            Arc::new(FileImportService::default()),
            Arc::new(FilesystemAccess),
            cx.settings.clone(),
        );
        Signum {
            workspace: Arc::new(workspace),
            interactive: cx.interactive,
        }
    }

    /// Imports `paths`. If the result offers to explore subfolders and a terminal
    /// is attached, lets the user pick one and imports that too.
    pub async fn import(&self, paths: &[PathBuf]) -> anyhow::Result<ImportSummary> {
        let mut summary = self
            .workspace
            .add_files(paths)
            .await
            .context("Import failed")?;

        if let Some(alert) = &summary.alert {
            print_alert(alert);
            if let Some(subfolders) = alert.explorable_subfolders() {
                if self.interactive {
                    if let Some(chosen) = pick_subfolder(subfolders.to_vec()).await? {
                        debug!("Exploring {}", chosen.display());
                        self.workspace.dismiss_alert().await;
                        summary = self
                            .workspace
                            .add_files(&[chosen])
                            .await
                            .context("Import failed")?;
                        if let Some(alert) = &summary.alert {
                            print_alert(alert);
                        }
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Runs batch analysis, printing progress as it goes.
    pub async fn analyze(&self) -> anyhow::Result<()> {
        let _progress = Listener::new(
            &self.workspace.on.progress_changed,
            |e: &ProgressChanged| {
                eprintln!(
                    "{} {:>3.0}%",
                    style("Analyzing").cyan().bold(),
                    e.progress * 100.0
                );
            },
        );
        self.workspace
            .start_batch_processing()
            .await
            .context("Analysis failed")?;
        Ok(())
    }
}

fn width() -> usize {
    let (_, columns) = Term::stdout().size();
    (columns as usize).clamp(40, MAX_WIDTH)
}

pub fn print_alert(alert: &ImportAlert) {
    eprintln!();
    eprintln!("{}", style(&alert.title).yellow().bold());
    for line in alert.message.lines() {
        eprintln!("{}", textwrap::fill(line, width()));
    }
    eprintln!();
}

fn status_label(status: &DocumentStatus) -> String {
    let label = status.label();
    match status {
        DocumentStatus::Verified | DocumentStatus::Renamed => style(label).green().to_string(),
        DocumentStatus::NeedsReview => style(label).yellow().to_string(),
        DocumentStatus::Error { .. } | DocumentStatus::Invalid { .. } => {
            style(label).red().to_string()
        }
        DocumentStatus::Pending | DocumentStatus::Analyzing => style(label).dim().to_string(),
    }
}

pub fn print_document(document: &Document) {
    println!(
        "  {:<14} {}",
        status_label(document.status()),
        document.path().display()
    );
    if let Some(reason) = document.invalid_reason() {
        println!("  {:<14} {}", "", style(reason).dim());
    }
    if let Some(message) = document.error_message() {
        println!("  {:<14} {}", "", style(message).dim());
    }
    if let Some(name) = &document.suggested_name {
        println!("  {:<14} suggested: {}", "", style(name).italic());
    }
}

pub fn print_documents(documents: &[Document]) {
    if documents.is_empty() {
        println!("{}", style("No documents.").dim());
        return;
    }
    println!("{}", style(format!("{} documents", documents.len())).bold());
    for document in documents {
        print_document(document);
    }
}

/// The file stem, used as the default when asking for a new name.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
