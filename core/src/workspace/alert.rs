use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::import::{ImportError, ImportFailures};

/// Subfolders named in an alert before the rest are summarized as "and N more".
const LISTED_SUBFOLDERS: usize = 3;

/// How a front-end should present an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStyle {
    Default,
    Cancel,
    Destructive,
}

/// What happens when an action is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertActionKind {
    /// Close the alert.
    Dismiss,
    /// Offer the user a choice of `paths`, then import the chosen one.
    ExploreSubfolders { paths: Vec<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertAction {
    pub label: String,
    pub style: ActionStyle,
    pub kind: AlertActionKind,
}

impl AlertAction {
    fn dismiss(label: &str) -> Self {
        AlertAction {
            label: label.to_string(),
            style: ActionStyle::Cancel,
            kind: AlertActionKind::Dismiss,
        }
    }
}

/// A message about an import, with the actions the user can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportAlert {
    pub title: String,
    pub message: String,
    pub actions: Vec<AlertAction>,
}

impl ImportAlert {
    /// An alert whose only action is "OK".
    pub fn simple(title: impl Into<String>, message: impl Into<String>) -> Self {
        ImportAlert {
            title: title.into(),
            message: message.into(),
            actions: vec![AlertAction::dismiss("OK")],
        }
    }

    /// Offers to explore the subfolders of a folder that has no PDFs of its own.
    pub fn folder_with_subfolders(folder: &Path, subfolders: Vec<PathBuf>) -> Self {
        let folder_name = display_name(folder);
        let mut listed = subfolders
            .iter()
            .take(LISTED_SUBFOLDERS)
            .map(|p| display_name(p))
            .collect::<Vec<_>>()
            .join(", ");
        let more = subfolders.len().saturating_sub(LISTED_SUBFOLDERS);
        if more > 0 {
            listed = format!("{listed} and {more} more");
        }

        ImportAlert {
            title: "Folder without PDFs".to_string(),
            message: format!(
                "The folder '{folder_name}' has no PDFs at the top level, but it has subfolders: {listed}.\n\nDo you want to explore the subfolders?"
            ),
            actions: vec![
                AlertAction::dismiss("Cancel"),
                AlertAction {
                    label: "Explore".to_string(),
                    style: ActionStyle::Default,
                    kind: AlertActionKind::ExploreSubfolders { paths: subfolders },
                },
            ],
        }
    }

    /// Builds the alert for a batch that had failures, driven by the first one.
    ///
    /// `added` is the number of documents the same batch added to the workspace.
    pub fn for_failures(failures: &ImportFailures, added: usize) -> Option<Self> {
        let (path, first) = failures.first()?;

        if let ImportError::DirectoryHasNoValidPdfs {
            has_subfolders: true,
            subfolders,
        } = first
        {
            return Some(Self::folder_with_subfolders(path, subfolders.clone()));
        }

        let alert = if failures.len() == 1 {
            ImportAlert::simple("Import failed", format!("Could not import a file: {first}"))
        } else {
            ImportAlert::simple(
                "Import incomplete",
                format!(
                    "Imported {added} files, but {} failed. Example: {first}",
                    failures.len()
                ),
            )
        };
        Some(alert)
    }

    /// Subfolders offered by this alert, if it offers any.
    pub fn explorable_subfolders(&self) -> Option<&[PathBuf]> {
        self.actions.iter().find_map(|a| match &a.kind {
            AlertActionKind::ExploreSubfolders { paths } => Some(paths.as_slice()),
            AlertActionKind::Dismiss => None,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Asks the user whether to rename to a free, suffixed name instead of the
/// requested one, which is already taken by another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateNamePrompt {
    pub document_id: Uuid,
    /// The sanitized name the user asked for, without extension.
    pub requested_name: String,
    /// The first free name, e.g. "Report (2)".
    pub suggested_name: String,
    /// The existing file that holds the requested name.
    pub conflicting_path: PathBuf,
}

impl DuplicateNamePrompt {
    pub fn message(&self) -> String {
        format!(
            "A file named '{}.pdf' already exists. Rename to '{}.pdf' instead?",
            self.requested_name, self.suggested_name
        )
    }
}
