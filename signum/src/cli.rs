use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Signum: import, review and rename PDF case documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Simulated analysis time per document, in milliseconds.
    /// Overrides SIGNUM_ANALYSIS_DELAY_MS.
    #[arg(long, global = true)]
    pub analysis_delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import PDFs from files and folders and list what was found.
    Import(ImportArgs),
    /// Show how a folder would be imported, without importing it.
    Inspect(InspectArgs),
    /// Import, analyze, then rename each document interactively.
    Review(ReviewArgs),
    /// Rename a single PDF.
    Rename(RenameArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Files and/or folders to import. Folders are scanned one level deep.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print the result as JSON instead of a listing.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// The folder to analyze.
    pub folder: PathBuf,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Files and/or folders to import.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Accept suggested names (and numbered alternatives) without asking.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// The PDF to rename.
    pub file: PathBuf,

    /// New name, with or without the .pdf extension.
    pub new_name: String,

    /// If the name is taken, use the next free numbered name without asking.
    #[arg(long, short)]
    pub yes: bool,
}
