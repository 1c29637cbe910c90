use anyhow::{bail, Context, Result};
use console::style;
use serde_json::json;
use signum_core::import::analyze_directory;
use signum_core::RenameOutcome;
use tracing::info;

use crate::app::{self, confirm, print_documents, Signum};
use crate::cli::{ImportArgs, InspectArgs, RenameArgs, ReviewArgs};
use crate::AppContext;

// --- Handler Functions ---

pub async fn handle_import(args: ImportArgs, cx: AppContext) -> Result<()> {
    let signum = Signum {
        // JSON output is for scripts; never stop to ask.
        interactive: cx.interactive && !args.json,
        ..Signum::new(&cx)
    };
    let summary = signum.import(&args.paths).await?;
    let documents = signum.workspace.documents().await;

    if args.json {
        let output = json!({
            "added": summary.added,
            "duplicates": summary.duplicates,
            "documents": documents,
            "failures": summary.failures,
            "alert": summary.alert,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_documents(&documents);
    if summary.duplicates > 0 {
        println!("{}", style(format!("{} already listed", summary.duplicates)).dim());
    }
    Ok(())
}

pub async fn handle_inspect(args: InspectArgs) -> Result<()> {
    let analysis = analyze_directory(&args.folder)
        .await
        .with_context(|| format!("Cannot read folder {}", args.folder.display()))?;

    println!("{}", style(args.folder.display()).bold());
    println!("  {} visible items, {} other files", analysis.total_items, analysis.non_pdf_count);

    println!("  {}", style("PDFs").bold());
    for pdf in analysis.valid_pdfs() {
        println!("    {} {}", style("ok").green(), pdf.path.display());
    }
    for pdf in analysis.zombie_pdfs() {
        let reason = pdf
            .invalid_reason
            .map(|r| r.to_string())
            .unwrap_or_default();
        println!("    {} {} ({})", style("!!").red(), pdf.path.display(), reason);
    }

    if analysis.has_subfolders() {
        println!("  {} (not scanned)", style("Subfolders").bold());
        for folder in &analysis.subfolders {
            println!("    {}", folder.display());
        }
    }
    Ok(())
}

pub async fn handle_review(args: ReviewArgs, cx: AppContext) -> Result<()> {
    if !cx.interactive && !args.yes {
        bail!("Review needs an interactive terminal; pass --yes to accept suggested names");
    }
    let signum = Signum::new(&cx);

    let summary = signum.import(&args.paths).await?;
    info!("Imported {} documents", summary.added);
    if signum.workspace.documents().await.is_empty() {
        println!("{}", style("Nothing to review.").dim());
        return Ok(());
    }

    signum.analyze().await?;
    let renamed = app::review(&signum, args.yes).await?;

    println!();
    print_documents(&signum.workspace.documents().await);
    println!("{}", style(format!("{renamed} files renamed")).bold());
    Ok(())
}

pub async fn handle_rename(args: RenameArgs, cx: AppContext) -> Result<()> {
    let signum = Signum {
        interactive: false,
        ..Signum::new(&cx)
    };
    let summary = signum.import(std::slice::from_ref(&args.file)).await?;
    let Some(document) = signum.workspace.documents().await.into_iter().next() else {
        let reason = summary
            .alert
            .map(|a| a.message)
            .unwrap_or_else(|| "nothing was imported".to_string());
        bail!("Cannot rename {}: {}", args.file.display(), reason);
    };

    let outcome = signum
        .workspace
        .finalize_and_rename_document(document.id(), &args.new_name)
        .await?;

    let outcome = match outcome {
        RenameOutcome::NeedsConfirmation(prompt) => {
            println!("{}", style(prompt.message()).yellow());
            let accepted = args.yes
                || (cx.interactive && confirm(format!("Use '{}.pdf'?", prompt.suggested_name)).await?);
            if !accepted {
                bail!("Not renamed: '{}.pdf' already exists", prompt.requested_name);
            }
            signum.workspace.confirm_rename(&prompt).await?
        }
        other => other,
    };

    match outcome {
        RenameOutcome::Renamed { path } => {
            println!("{} {}", style("Renamed to").green(), path.display())
        }
        RenameOutcome::Unchanged => println!("{}", style("Name unchanged").dim()),
        RenameOutcome::NeedsConfirmation(prompt) => {
            bail!("Not renamed: '{}.pdf' was taken in the meantime", prompt.suggested_name);
        }
    }
    Ok(())
}
