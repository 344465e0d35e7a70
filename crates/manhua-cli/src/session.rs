//! Interactive editing session.
//!
//! One command per line. `edit` is a whole text-edit session on its own:
//! the text is applied as typed and committed when the command ends, so
//! each `edit` is one undo step.

// CLI output is intentional
#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use manhua_core::{
    AnalysisOutcome, AnalysisState, AppConfig, Editor, Page, PageId, PersistedHistoryRecord, ToneType,
    util::format_timestamp,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::commands::parse_genre;

const HELP: &str = "\
Commands:
  add <image>...          add pages and analyze them
  pages                   list pages (* marks the active page)
  select <n>              make page n active
  show                    show the active page
  edit <item> <text>      replace an item's translated text
  tone <item> <tone>      set an item's tone (casual, formal, angry, scared)
  delete <item>           delete an item
  undo | redo             step through the active page's history
  remove-page [n]         remove page n (default: the active page)
  history                 list saved pages
  restore <n|id>          open a saved page
  genre [name]            show or set the genre
  export [file]           export all pages as text
  help                    show this help
  quit                    save and leave";

pub async fn run(config: &AppConfig, images: &[PathBuf]) -> Result<()> {
    let editor = Editor::from_config(config).context("Failed to initialize editor")?;

    for path in images {
        add_page(&editor, path).await;
    }

    println!("Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        if matches!(command, "quit" | "exit") {
            break;
        }

        if let Err(e) = dispatch(&editor, command, rest).await {
            // Errors are messages in the session, never fatal
            println!("{e:#}");
        }
    }

    if editor.flush().await {
        println!("Saved.");
    }
    Ok(())
}

async fn dispatch(editor: &Editor, command: &str, rest: &str) -> Result<()> {
    debug!("Session command: {} {}", command, rest);

    match command {
        "help" => println!("{HELP}"),
        "add" => {
            if rest.is_empty() {
                anyhow::bail!("usage: add <image>...");
            }
            for path in rest.split_whitespace() {
                add_page(editor, Path::new(path)).await;
            }
        }
        "pages" => print_pages(editor).await,
        "select" => {
            let id = page_at(editor, parse_number(rest, "select <n>")?).await?;
            editor.select_page(&id).await;
            print_active(editor).await;
        }
        "show" => print_active(editor).await,
        "edit" => {
            let (item, text) = rest
                .split_once(char::is_whitespace)
                .context("usage: edit <item> <text>")?;
            let item = parse_number(item, "edit <item> <text>")?;
            editor.edit_text(item, text.trim()).await?;
            editor.end_edit().await?;
        }
        "tone" => {
            let (item, tone) = rest
                .split_once(char::is_whitespace)
                .context("usage: tone <item> <tone>")?;
            let item = parse_number(item, "tone <item> <tone>")?;
            let tone = ToneType::from_name(tone.trim())
                .with_context(|| format!("Unknown tone '{}'", tone.trim()))?;
            editor.set_tone(item, tone).await?;
        }
        "delete" => {
            let item = parse_number(rest, "delete <item>")?;
            editor.delete_item(item).await?;
        }
        "undo" => {
            if !editor.undo().await? {
                println!("Nothing to undo");
            }
        }
        "redo" => {
            if !editor.redo().await? {
                println!("Nothing to redo");
            }
        }
        "remove-page" => {
            let id = if rest.is_empty() {
                editor.active_page_id().await.context("No active page")?
            } else {
                page_at(editor, parse_number(rest, "remove-page [n]")?).await?
            };
            editor.delete_page(&id).await;
            print_pages(editor).await;
        }
        "history" => {
            let records = editor.history();
            if records.is_empty() {
                println!("No saved pages");
            }
            for (index, record) in records.iter().enumerate() {
                println!(
                    "{:>2}. {}  {}  {} ({} items)",
                    index + 1,
                    format_timestamp(record.timestamp),
                    record.genre.label(),
                    record.file_name,
                    record.translations.len()
                );
            }
        }
        "restore" => {
            let record_id = match rest.parse::<usize>() {
                Ok(n) => record_at(&editor.history(), n)
                    .map(|r| r.id.clone())
                    .with_context(|| format!("No saved page {n}"))?,
                Err(_) => rest.to_string(),
            };
            let restored = editor
                .restore(&record_id)
                .await
                .with_context(|| format!("No saved page {record_id}"))?;
            println!("Restored (genre: {})", restored.genre.label());
            print_active(editor).await;
        }
        "genre" => {
            if rest.is_empty() {
                println!("{}", editor.settings().await.genre.label());
            } else {
                editor.set_genre(parse_genre(rest)?).await;
            }
        }
        "export" => {
            let doc = editor.export().await;
            let path = if rest.is_empty() {
                PathBuf::from(&doc.file_name)
            } else {
                PathBuf::from(rest)
            };
            std::fs::write(&path, &doc.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        _ => anyhow::bail!("Unknown command '{command}', type 'help'"),
    }

    Ok(())
}

/// Add one image and report its analysis when it finishes.
async fn add_page(editor: &Editor, path: &Path) {
    let (image, file_name) = match crate::load_image(path) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{e:#}");
            return;
        }
    };

    let pending = editor.add_page(image, file_name.clone()).await;
    println!("Analyzing {file_name}...");

    tokio::spawn(async move {
        match pending.wait().await {
            AnalysisOutcome::Analyzed { items } => println!("{file_name}: {items} items ready"),
            AnalysisOutcome::Failed { error, message } => {
                println!("{file_name}: {message}");
                if error.requires_credential() {
                    println!("Set a key with `manhua credentials set <KEY>` or GEMINI_API_KEY.");
                }
            }
            AnalysisOutcome::Discarded => warn!("{} was removed before analysis finished", file_name),
        }
    });
}

async fn print_pages(editor: &Editor) {
    editor
        .with_workspace(|ws| {
            if ws.collection().is_empty() {
                println!("No pages");
            }
            let active = ws.collection().active_id();
            for (index, page) in ws.collection().iter().enumerate() {
                let marker = if Some(page.id()) == active { "*" } else { " " };
                println!(
                    "{}{:>2}. {} [{}] {} items",
                    marker,
                    index + 1,
                    page.source_file_name(),
                    state_label(page),
                    page.translations().len()
                );
            }
        })
        .await;
}

async fn print_active(editor: &Editor) {
    editor
        .with_workspace(|ws| {
            let Some(page) = ws.active() else {
                println!("No active page");
                return;
            };

            println!(
                "{} [{}] genre: {}",
                page.source_file_name(),
                state_label(page),
                ws.settings().genre.label()
            );
            if page.translations().is_empty() && !page.is_analyzing() {
                println!("  (no text)");
            }
            for item in page.translations() {
                println!(
                    "  [{}] {:<9} {:<6} {}\n        -> {}",
                    item.id,
                    item.kind.as_str(),
                    item.tone.as_str(),
                    item.original_text,
                    item.translated_text
                );
            }

            let history = page.history();
            println!(
                "history {}/{}{}{}",
                history.cursor() + 1,
                history.len(),
                if page.can_undo() { ", undo" } else { "" },
                if page.can_redo() { ", redo" } else { "" }
            );
            if let Some(saved) = ws.last_saved_at() {
                println!("auto-saved {}", format_timestamp(saved));
            }
        })
        .await;
}

fn state_label(page: &Page) -> &'static str {
    match page.state() {
        AnalysisState::Analyzing => "analyzing",
        AnalysisState::Analyzed => "ready",
        AnalysisState::Failed => "failed",
        AnalysisState::Restored => "restored",
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, usage: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("usage: {usage}"))
}

/// 1-based lookup in the history listing.
fn record_at(records: &[PersistedHistoryRecord], position: usize) -> Option<&PersistedHistoryRecord> {
    records.get(position.checked_sub(1)?)
}

async fn page_at(editor: &Editor, position: usize) -> Result<PageId> {
    editor
        .with_workspace(|ws| ws.collection().at_position(position).map(|p| p.id().clone()))
        .await
        .with_context(|| format!("No page {position}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use manhua_core::Genre;

    fn record(id: &str) -> PersistedHistoryRecord {
        PersistedHistoryRecord {
            id: id.to_string(),
            file_name: format!("{id}.png"),
            timestamp: 0,
            genre: Genre::default(),
            translations: Vec::new(),
        }
    }

    #[test]
    fn test_record_at_is_one_based() {
        let records = vec![record("a"), record("b")];
        assert_eq!(record_at(&records, 1).map(|r| r.id.as_str()), Some("a"));
        assert_eq!(record_at(&records, 2).map(|r| r.id.as_str()), Some("b"));
        assert!(record_at(&records, 0).is_none());
        assert!(record_at(&records, 3).is_none());
    }
}
