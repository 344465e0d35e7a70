//! Manhua Editor Core Library
//!
//! This library provides the page-state core of the manhua translation editor:
//! - Translation items and per-page undo/redo history
//! - The page collection with a single active page
//! - Page analysis through a vision model (Gemini), with an in-memory cache
//! - Debounced auto-save into durable history, and restoring from it
//! - Plain-text export
//!
//! [`Editor`] ties these together behind one lock.

pub mod analyzer;
pub mod autosave;
pub mod collection;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod history;
pub mod model;
pub mod page;
pub mod restore;
pub mod settings;
pub mod store;
pub mod util;

pub use analyzer::{AnalysisRequest, Analyzer, AnalyzerInfo, CachedAnalyzer, GeminiAnalyzer, create_analyzer};
pub use autosave::AutoPersistController;
pub use collection::PageCollection;
pub use config::{AnalyzerConfig, AppConfig, AutosaveConfig, EditorConfig, StoreConfig};
pub use editor::{AnalysisOutcome, Editor, ExportedDocument, PendingAnalysis, Workspace};
pub use error::{AnalysisError, Error, Result};
pub use export::{ExportPage, default_file_name, export_document};
pub use history::{DEFAULT_HISTORY_CAPACITY, PageHistoryLog};
pub use model::{ToneType, TranslationItem, TranslationType};
pub use page::{AnalysisState, ContinuousEdit, DiscreteEdit, Page, PageId, PageImage};
pub use restore::{RestorePath, RestoredPage};
pub use settings::{DEFAULT_MODEL, Genre, GlossaryEntry, ProjectSettings};
pub use store::{
    CredentialEntry, CredentialStore, HistoryStore, KeyValueStore, MemoryStore, PersistedHistoryRecord,
    SledStore, open_store,
};
