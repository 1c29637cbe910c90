use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::import::{ImportResult, InvalidReason};

/// Where a document is in the review workflow.
///
/// Serialized with an explicit `state` tag, e.g. `{"state":"invalid","reason":"empty_file"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Imported, not analyzed yet.
    Pending,
    /// Analysis is running.
    Analyzing,
    /// Analysis finished; waiting for the user to confirm a name.
    NeedsReview,
    /// The user confirmed the name.
    Verified,
    /// The file was moved on disk as a separate step.
    Renamed,
    /// Analysis failed. Can be retried.
    Error { message: String },
    /// The file was found but cannot be used.
    Invalid { reason: InvalidReason },
}

impl DocumentStatus {
    /// Whether a document in this state may move to `next`.
    pub fn allows(&self, next: &DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Analyzing | Error { .. } | Verified)
                | (Error { .. }, Analyzing | Pending | Verified)
                | (Analyzing, NeedsReview | Error { .. })
                | (NeedsReview, Verified | Error { .. })
                | (Verified, Verified | Renamed)
                | (Renamed, Verified)
        )
    }

    /// Picked up by batch processing.
    pub fn is_processable(&self) -> bool {
        matches!(self, DocumentStatus::Pending | DocumentStatus::Error { .. })
    }

    /// Still waiting on the user (used to pick the next selection).
    pub fn awaits_review(&self) -> bool {
        matches!(self, DocumentStatus::Pending | DocumentStatus::NeedsReview)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Analyzing => "analyzing",
            DocumentStatus::NeedsReview => "needs review",
            DocumentStatus::Verified => "verified",
            DocumentStatus::Renamed => "renamed",
            DocumentStatus::Error { .. } => "error",
            DocumentStatus::Invalid { .. } => "invalid",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Error { message } => write!(f, "error: {message}"),
            DocumentStatus::Invalid { reason } => write!(f, "invalid: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Facts pulled out of a document by analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Kind of filing, e.g. "JUICIO DE AMPARO".
    pub document_type: Option<String>,
    /// Case (file) number, e.g. "973/2024".
    pub case_number: Option<String>,
    /// The notice number the user marked on the page, if any.
    pub selected_notice: Option<String>,
}

impl ExtractedMetadata {
    /// A file name built from the extracted facts, if there are any.
    pub fn suggested_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.document_type, &self.case_number, &self.selected_notice]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            // Case numbers contain '/', which cannot appear in a file name.
            Some(parts.join(" ").replace('/', "-"))
        }
    }
}

/// A PDF that was imported into the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: Uuid,
    path: PathBuf,
    origin: PathBuf,
    original_file_name: String,
    /// The name shown in (and edited through) the inspector.
    pub edited_name: String,
    pub suggested_name: Option<String>,
    pub metadata: ExtractedMetadata,
    pub(crate) status: DocumentStatus,
}

impl Document {
    pub(crate) fn from_import(result: &ImportResult) -> Self {
        let original_file_name = result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = match result.invalid_reason {
            Some(reason) if !result.is_valid => DocumentStatus::Invalid { reason },
            None if !result.is_valid => DocumentStatus::Invalid {
                reason: InvalidReason::Corrupted,
            },
            _ => DocumentStatus::Pending,
        };
        Document {
            id: Uuid::new_v4(),
            path: result.path.clone(),
            origin: result.origin.clone(),
            edited_name: original_file_name.clone(),
            original_file_name,
            suggested_name: None,
            metadata: ExtractedMetadata::default(),
            status,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file or folder the user selected when this document was imported.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    /// The file name as it is on disk now.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn status(&self) -> &DocumentStatus {
        &self.status
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.status, DocumentStatus::Invalid { .. })
    }

    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self.status {
            DocumentStatus::Invalid { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            DocumentStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

impl std::hash::Hash for Document {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imported(path: &str, valid: bool, reason: Option<InvalidReason>) -> ImportResult {
        ImportResult {
            path: PathBuf::from(path),
            origin: PathBuf::from("/cases"),
            is_valid: valid,
            invalid_reason: reason,
        }
    }

    #[test]
    fn new_documents_start_pending_or_invalid() {
        let doc = Document::from_import(&imported("/cases/973_2024.pdf", true, None));
        assert_eq!(doc.status(), &DocumentStatus::Pending);
        assert_eq!(doc.original_file_name(), "973_2024.pdf");
        assert_eq!(doc.edited_name, "973_2024.pdf");
        assert_eq!(doc.origin(), Path::new("/cases"));

        let zombie = Document::from_import(&imported(
            "/cases/empty.pdf",
            false,
            Some(InvalidReason::EmptyFile),
        ));
        assert_eq!(zombie.invalid_reason(), Some(InvalidReason::EmptyFile));
        assert!(!zombie.is_valid());
    }

    #[test]
    fn ids_are_unique() {
        let a = Document::from_import(&imported("/cases/a.pdf", true, None));
        let b = Document::from_import(&imported("/cases/a.pdf", true, None));
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn only_retryable_states_are_processable() {
        assert!(DocumentStatus::Pending.is_processable());
        assert!(DocumentStatus::Error { message: "timeout".into() }.is_processable());
        assert!(!DocumentStatus::NeedsReview.is_processable());
        assert!(!DocumentStatus::Invalid { reason: InvalidReason::Corrupted }.is_processable());
    }

    #[test]
    fn transitions_are_one_directional() {
        use DocumentStatus::*;
        assert!(Pending.allows(&Analyzing));
        assert!(Analyzing.allows(&NeedsReview));
        assert!(NeedsReview.allows(&Verified));
        assert!(Verified.allows(&Renamed));
        assert!(Error { message: "x".into() }.allows(&Analyzing));

        assert!(!NeedsReview.allows(&Pending));
        assert!(!Verified.allows(&Analyzing));
        assert!(!Analyzing.allows(&Verified));
        assert!(!Invalid { reason: InvalidReason::EmptyFile }.allows(&Verified));
    }

    #[test]
    fn status_has_an_explicit_discriminant() {
        let json = serde_json::to_value(DocumentStatus::Invalid {
            reason: InvalidReason::EmptyFile,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"state": "invalid", "reason": "empty_file"}));

        let back: DocumentStatus =
            serde_json::from_value(serde_json::json!({"state": "needs_review"})).unwrap();
        assert_eq!(back, DocumentStatus::NeedsReview);
    }

    #[test]
    fn suggested_name_skips_missing_parts() {
        let metadata = ExtractedMetadata {
            document_type: Some("JUICIO DE AMPARO".into()),
            case_number: Some("973/2024".into()),
            selected_notice: None,
        };
        assert_eq!(metadata.suggested_name().as_deref(), Some("JUICIO DE AMPARO 973-2024"));
        assert_eq!(ExtractedMetadata::default().suggested_name(), None);
    }
}
