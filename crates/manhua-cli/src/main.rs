//! Manhua Editor CLI - translate manhua pages and edit the results.

mod commands;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manhua_core::{AppConfig, PageImage};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "manhua")]
#[command(author, version, about = "Translate manhua pages with a vision model", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Gemini API key (used when no credential is stored)
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_API_BASE", global = true)]
    api_base: Option<String>,

    /// Model name
    #[arg(long, env = "GEMINI_MODEL", global = true)]
    model: Option<String>,

    /// Store directory
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze images and export their translations
    Translate {
        /// Input images, one page each
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output text file (default: Translation_<name>.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Genre used for the prompt
        #[arg(long)]
        genre: Option<String>,

        /// Do not save analyzed pages to history
        #[arg(long)]
        no_save: bool,
    },

    /// Inspect persisted page history
    History {
        #[command(subcommand)]
        action: commands::HistoryAction,
    },

    /// Manage stored API keys
    Credentials {
        #[command(subcommand)]
        action: commands::CredentialAction,
    },

    /// Show the glossary sent with each page
    Glossary {
        /// Only entries matching this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Interactive editing session
    Edit {
        /// Images to add when the session starts
        images: Vec<PathBuf>,
    },
}

/// Read an image file and guess its MIME type from the extension.
pub(crate) fn load_image(path: &Path) -> Result<(PageImage, String)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    if mime_type.type_() != mime_guess::mime::IMAGE {
        anyhow::bail!("Not an image: {} ({})", path.display(), mime_type);
    }

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("page")
        .to_string();

    Ok((PageImage::new(bytes, mime_type.essence_str()), file_name))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(api_key) = args.api_key {
        config.analyzer.api_key = Some(api_key);
    }
    if let Some(api_base) = args.api_base {
        config.analyzer.api_base = api_base;
    }
    if let Some(model) = args.model {
        config.editor.model = model;
    }
    if let Some(store) = args.store {
        config.store.path = Some(store);
    }

    match args.command {
        Command::Translate {
            images,
            output,
            genre,
            no_save,
        } => commands::translate(&config, &images, output, genre.as_deref(), no_save).await,
        Command::History { action } => commands::history(&config, action),
        Command::Credentials { action } => commands::credentials(&config, action),
        Command::Glossary { search } => {
            commands::glossary(search.as_deref());
            Ok(())
        }
        Command::Edit { images } => session::run(&config, &images).await,
    }
}
