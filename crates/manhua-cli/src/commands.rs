//! Batch commands: translate, history, credentials, glossary.

// CLI output is intentional
#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use clap::Subcommand;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use manhua_core::{
    AnalysisOutcome, AppConfig, CredentialStore, Editor, ExportPage, Genre, HistoryStore, ProjectSettings,
    default_file_name, export_document, open_store,
    util::{format_timestamp, mask_secret},
};
use std::path::PathBuf;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List saved pages, newest first
    List,
    /// Show one saved page
    Show { id: String },
    /// Delete a saved page
    Delete { id: String },
    /// Export a saved page as text
    Export {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CredentialAction {
    /// Save the active API key
    Set { key: String },
    /// Forget the active API key
    Clear,
    /// Save a key under an alias
    Add { alias: String, key: String },
    /// List saved keys
    List,
    /// Make a saved key the active one
    Use { alias: String },
    /// Forget a saved key
    Remove { alias: String },
}

pub(crate) fn parse_genre(name: &str) -> Result<Genre> {
    Genre::from_name(name).with_context(|| {
        let names: Vec<&str> = Genre::ALL.iter().map(|g| g.as_str()).collect();
        format!("Unknown genre '{}', expected one of {}", name, names.join(", "))
    })
}

pub async fn translate(
    config: &AppConfig,
    images: &[PathBuf],
    output: Option<PathBuf>,
    genre: Option<&str>,
    no_save: bool,
) -> Result<()> {
    let editor = Editor::from_config(config).context("Failed to initialize editor")?;
    if let Some(genre) = genre {
        editor.set_genre(parse_genre(genre)?).await;
    }

    info!("Analyzing {} pages with {}", images.len(), editor.analyzer_name());

    // Setup progress bar
    #[allow(clippy::cast_possible_truncation)]
    let pb = ProgressBar::new(images.len() as u64);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut pending = Vec::with_capacity(images.len());
    for path in images {
        let (image, file_name) = crate::load_image(path)?;
        pending.push((file_name.clone(), editor.add_page(image, file_name).await));
    }

    let outcomes = join_all(pending.into_iter().map(|(file_name, analysis)| {
        let pb = pb.clone();
        async move {
            let page_id = analysis.page_id.clone();
            let outcome = analysis.wait().await;
            pb.set_message(file_name.clone());
            pb.inc(1);
            (file_name, page_id, outcome)
        }
    }))
    .await;

    pb.finish_with_message("Analysis complete");

    let mut failed = 0;
    for (file_name, page_id, outcome) in &outcomes {
        match outcome {
            AnalysisOutcome::Analyzed { items } => {
                println!("{file_name}: {items} items");
                if !no_save && *items > 0 {
                    editor.select_page(page_id).await;
                    editor.flush().await;
                }
            }
            AnalysisOutcome::Failed { error, message } => {
                failed += 1;
                println!("{file_name}: {message} ({error})");
            }
            AnalysisOutcome::Discarded => {}
        }
    }

    let doc = editor.export().await;
    let output_path = output.unwrap_or_else(|| PathBuf::from(&doc.file_name));
    std::fs::write(&output_path, &doc.bytes)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    println!("Translations saved to: {}", output_path.display());

    if failed == outcomes.len() {
        anyhow::bail!("No page could be analyzed");
    }
    Ok(())
}

pub fn history(config: &AppConfig, action: HistoryAction) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open store")?;
    let history = HistoryStore::with_max_records(store, config.autosave.max_records);

    match action {
        HistoryAction::List => {
            let records = history.list();
            if records.is_empty() {
                println!("No saved pages");
            }
            for record in records {
                println!(
                    "{}  {}  {}  {} ({} items)",
                    record.id,
                    format_timestamp(record.timestamp),
                    record.genre.label(),
                    record.file_name,
                    record.translations.len()
                );
            }
        }
        HistoryAction::Show { id } => {
            let record = history
                .find(&id)
                .with_context(|| format!("No saved page with id {id}"))?;
            println!("{} ({}, {})", record.file_name, record.genre.label(), format_timestamp(record.timestamp));
            for item in &record.translations {
                println!(
                    "[{}] {}/{}  {} -> {}",
                    item.id, item.kind, item.tone, item.original_text, item.translated_text
                );
            }
        }
        HistoryAction::Delete { id } => {
            if history.remove(&id)? {
                println!("Deleted {id}");
            } else {
                anyhow::bail!("No saved page with id {id}");
            }
        }
        HistoryAction::Export { id, output } => {
            let record = history
                .find(&id)
                .with_context(|| format!("No saved page with id {id}"))?;
            let pages = [ExportPage::from(&record)];
            let output_path = output.unwrap_or_else(|| PathBuf::from(default_file_name(&pages)));
            std::fs::write(&output_path, export_document(&pages))
                .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
            println!("Translations saved to: {}", output_path.display());
        }
    }

    Ok(())
}

pub fn credentials(config: &AppConfig, action: CredentialAction) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open store")?;
    let credentials = CredentialStore::new(store);

    match action {
        CredentialAction::Set { key } => {
            credentials.set_active(&key)?;
            println!("API key saved ({})", mask_secret(key.trim()));
        }
        CredentialAction::Clear => {
            credentials.clear_active()?;
            println!("API key cleared");
        }
        CredentialAction::Add { alias, key } => {
            let entry = credentials.add(&alias, &key)?;
            println!("Saved '{}' ({})", entry.alias, mask_secret(&entry.key));
        }
        CredentialAction::List => {
            let active = credentials.active();
            match &active {
                Some(key) => println!("Active: {}", mask_secret(key)),
                None => println!("Active: none"),
            }
            for entry in credentials.list() {
                let marker = if active.as_deref() == Some(entry.key.as_str()) { "*" } else { " " };
                println!(
                    "{} {}  {}  added {}",
                    marker,
                    entry.alias,
                    mask_secret(&entry.key),
                    format_timestamp(entry.added_at)
                );
            }
        }
        CredentialAction::Use { alias } => {
            credentials.activate(&alias)?;
            println!("Using '{alias}'");
        }
        CredentialAction::Remove { alias } => {
            if credentials.remove(&alias)? {
                println!("Removed '{alias}'");
            } else {
                anyhow::bail!("No credential named '{alias}'");
            }
        }
    }

    Ok(())
}

pub fn glossary(search: Option<&str>) {
    let settings = ProjectSettings::default();
    let entries = match search {
        Some(query) => settings.search_glossary(query),
        None => settings.glossary.iter().collect(),
    };

    for entry in entries {
        println!("{} = {}", entry.term, entry.translation);
    }
}
