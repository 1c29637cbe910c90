use signum_core::config::{AppEnvironment, WorkspaceSettings};

pub mod app;
pub mod cli;
pub mod commands;

/// Everything resolved at startup, before any command runs.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub environment: AppEnvironment,
    pub settings: WorkspaceSettings,
    /// Whether stdin/stdout are attached to a terminal, so prompts can be shown.
    pub interactive: bool,
}
