use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use signum_core::workspace::DuplicateNamePrompt;
use signum_core::{Document, RenameOutcome};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{print_document, stem, Signum};

/// Walks the user through every document awaiting review, in workspace order.
///
/// With `accept_suggestions`, suggested names and numbered alternatives are
/// taken without asking.
pub async fn review(signum: &Signum, accept_suggestions: bool) -> anyhow::Result<usize> {
    let workspace = &signum.workspace;
    let mut skipped: HashSet<Uuid> = HashSet::new();
    let mut renamed = 0;

    while let Some(document) = next_for_review(signum, &skipped).await {
        println!();
        print_document(&document);
        let default = document
            .suggested_name
            .clone()
            .unwrap_or_else(|| stem(document.path()));

        let name = if accept_suggestions {
            default
        } else {
            prompt_name(&document.file_name(), default).await?
        };

        match workspace.finalize_and_rename_document(document.id(), &name).await {
            Ok(RenameOutcome::Renamed { path }) => {
                println!("  {} {}", style("renamed to").green(), path.display());
                renamed += 1;
            }
            Ok(RenameOutcome::Unchanged) => {
                println!("  {}", style("kept name, verified").green());
            }
            Ok(RenameOutcome::NeedsConfirmation(prompt)) => {
                if resolve_duplicate(signum, &prompt, accept_suggestions).await? {
                    renamed += 1;
                } else {
                    skipped.insert(document.id());
                }
            }
            Err(e) => {
                warn!("Rename of {} failed: {}", document.path().display(), e);
                println!("  {} {}", style("not renamed:").red(), e);
                skipped.insert(document.id());
            }
        }
    }
    Ok(renamed)
}

/// The selected document if it still awaits review, otherwise the first one that does.
async fn next_for_review(signum: &Signum, skipped: &HashSet<Uuid>) -> Option<Document> {
    let wanted = |d: &Document| d.status().awaits_review() && !skipped.contains(&d.id());

    if let Some(selected) = signum.workspace.selected_document().await {
        if wanted(&selected) {
            return Some(selected);
        }
    }
    let next = signum
        .workspace
        .documents()
        .await
        .into_iter()
        .find(|d| wanted(d))?;
    // Keeps the workspace's selection in step with what is shown.
    if let Err(e) = signum.workspace.select(next.id()).await {
        debug!("Could not select {}: {}", next.id(), e);
    }
    Some(next)
}

/// Asks whether to take the free numbered name. Returns whether the file was renamed.
async fn resolve_duplicate(
    signum: &Signum,
    prompt: &DuplicateNamePrompt,
    accept: bool,
) -> anyhow::Result<bool> {
    println!("  {}", style(prompt.message()).yellow());
    if !accept && !confirm(format!("Use '{}.pdf'?", prompt.suggested_name)).await? {
        return Ok(false);
    }
    match signum.workspace.confirm_rename(prompt).await? {
        RenameOutcome::Renamed { path } => {
            println!("  {} {}", style("renamed to").green(), path.display());
            Ok(true)
        }
        RenameOutcome::Unchanged => Ok(false),
        RenameOutcome::NeedsConfirmation(again) => {
            // Someone took the suggested name in the meantime.
            println!("  {}", style(again.message()).red());
            Ok(false)
        }
    }
}

// Prompts. dialoguer blocks, so each one runs on the blocking pool.

pub async fn prompt_name(file_name: &str, default: String) -> anyhow::Result<String> {
    let prompt = format!("New name for {file_name}");
    let result = tokio::task::spawn_blocking(move || {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact_text()
            .context("Failed to read name")
    })
    .await;

    let name = result.context("Blocking task failed (panic)")??;
    Ok(name)
}

pub async fn confirm(question: String) -> anyhow::Result<bool> {
    let result = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(question)
            .default(true)
            .interact()
            .context("Failed to read answer")
    })
    .await;

    let answer = result.context("Blocking task failed (panic)")??;
    Ok(answer)
}

/// Lets the user choose one subfolder. `None` if they cancel.
pub async fn pick_subfolder(subfolders: Vec<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    let items: Vec<String> = subfolders
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();

    let result = tokio::task::spawn_blocking(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Import which subfolder? (Esc to cancel)")
            .items(&items)
            .default(0)
            .interact_opt()
            .context("Failed to read selection")
    })
    .await;

    let choice = result.context("Blocking task failed (panic)")??;
    Ok(choice.and_then(|i| subfolders.get(i).cloned()))
}
