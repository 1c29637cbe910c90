//! Core of Signum: importing PDF case documents, tracking their review status,
//! and renaming them safely on disk.
//!
//! *   [`import`] turns user-selected files and folders into importable PDFs.
//! *   [`workspace`] owns the documents of a session and drives review and renaming.
//! *   [`access`] holds scoped grants on the roots documents were imported from.
//! *   [`config`] resolves application metadata and workspace settings.
//! *   [`event`] lets front-ends observe the workspace.

pub mod access;
pub mod config;
pub mod document;
pub mod event;
pub mod import;
pub mod workspace;

pub use document::{Document, DocumentStatus, ExtractedMetadata};
pub use workspace::{RenameOutcome, Workspace, WorkspaceError};
