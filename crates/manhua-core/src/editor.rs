//! The editing session: pages, settings, analysis and auto-save wired together.
//!
//! # Locking
//!
//! All state lives in one [`Workspace`] behind a single `tokio::sync::RwLock`.
//! Every operation takes the lock inside a synchronous closure and releases
//! it before returning, so no guard is ever held across an `.await`.
//! Analysis runs in its own task and takes the lock again only to install
//! its result, after checking that the page still exists.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyzer::{AnalysisRequest, AnalysisResult, Analyzer, create_analyzer};
use crate::autosave::AutoPersistController;
use crate::collection::PageCollection;
use crate::config::AppConfig;
use crate::error::{AnalysisError, Error, Result};
use crate::export::{ExportPage, default_file_name, export_document};
use crate::model::{ToneType, TranslationItem};
use crate::page::{ContinuousEdit, DiscreteEdit, Page, PageId, PageImage};
use crate::restore::{RestorePath, RestoredPage};
use crate::settings::{Genre, ProjectSettings};
use crate::store::{CredentialStore, HistoryStore, KeyValueStore, PersistedHistoryRecord, open_store};

/// State guarded by the editor lock.
pub struct Workspace {
    collection: PageCollection,
    settings: ProjectSettings,
    autosave: AutoPersistController,
}

impl Workspace {
    pub const fn collection(&self) -> &PageCollection {
        &self.collection
    }

    pub const fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn active(&self) -> Option<&Page> {
        self.collection.active()
    }

    pub fn last_saved_at(&self) -> Option<i64> {
        self.autosave.last_saved_at()
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Report the current active page and genre to auto-save.
    fn observe(&mut self) {
        self.autosave
            .observe(self.collection.active(), self.settings.genre);
    }
}

/// How a page's analysis ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Analyzed { items: usize },
    Failed { error: AnalysisError, message: String },
    /// The page was deleted before the result arrived
    Discarded,
}

/// A page whose analysis is running.
#[derive(Debug)]
pub struct PendingAnalysis {
    pub page_id: PageId,
    pub handle: JoinHandle<AnalysisOutcome>,
}

impl PendingAnalysis {
    /// Wait for the analysis to finish.
    pub async fn wait(self) -> AnalysisOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Analysis task for page {} ended abnormally: {}", self.page_id, e);
                let error = AnalysisError::Transport(format!("analysis task ended: {e}"));
                AnalysisOutcome::Failed {
                    message: error.user_message(),
                    error,
                }
            }
        }
    }
}

/// A rendered export.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Shared handle to one editing session. Cloning shares the session.
#[derive(Clone)]
pub struct Editor {
    workspace: Arc<RwLock<Workspace>>,
    analyzer: Arc<dyn Analyzer>,
    credentials: CredentialStore,
    restore: Arc<RestorePath>,
    fallback_key: Option<String>,
}

impl Editor {
    /// Open the configured store and analyzer and start an empty session.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = open_store(&config.store)?;
        let analyzer = create_analyzer(&config.analyzer)?;
        Ok(Self::new(config, store, analyzer))
    }

    pub fn new(config: &AppConfig, store: Arc<dyn KeyValueStore>, analyzer: Arc<dyn Analyzer>) -> Self {
        let history = Arc::new(HistoryStore::with_max_records(
            Arc::clone(&store),
            config.autosave.max_records,
        ));
        let autosave = AutoPersistController::with_delay(
            Arc::clone(&history),
            std::time::Duration::from_millis(config.autosave.delay_ms),
        );

        let settings = ProjectSettings {
            genre: config.editor.default_genre,
            model: config.editor.model.clone(),
            ..Default::default()
        };

        let workspace = Workspace {
            collection: PageCollection::with_history_capacity(config.editor.history_capacity),
            settings,
            autosave,
        };

        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            analyzer,
            credentials: CredentialStore::new(store),
            restore: Arc::new(RestorePath::new(history)),
            fallback_key: config
                .analyzer
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
        }
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Read the workspace within a closure.
    pub async fn with_workspace<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Workspace) -> R,
    {
        let workspace = self.workspace.read().await;
        f(&workspace)
    }

    /// Mutate the workspace within a closure, then let auto-save see the result.
    async fn with_workspace_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Workspace) -> R,
    {
        let mut workspace = self.workspace.write().await;
        let result = f(&mut workspace);
        workspace.observe();
        result
    }

    /// Apply `f` to the active page.
    async fn with_active_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Page) -> Result<R>,
    {
        self.with_workspace_mut(|ws| {
            let page = ws.collection.active_mut().ok_or(Error::NoActivePage)?;
            f(page)
        })
        .await
    }

    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    pub async fn active_page_id(&self) -> Option<PageId> {
        self.with_workspace(|ws| ws.collection.active_id().cloned()).await
    }

    /// The active page's translations, if there is an active page.
    pub async fn active_translations(&self) -> Option<Vec<TranslationItem>> {
        self.with_workspace(|ws| ws.active().map(|p| p.translations().to_vec()))
            .await
    }

    pub async fn settings(&self) -> ProjectSettings {
        self.with_workspace(|ws| ws.settings.clone()).await
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Add an uploaded image as a new active page and start analyzing it.
    ///
    /// Returns immediately. The analyzer sees the settings and credential
    /// as they are now, not when it finishes.
    pub async fn add_page(&self, image: PageImage, file_name: impl Into<String>) -> PendingAnalysis {
        let api_key = self.resolve_api_key();
        let image_bytes = image.shared_bytes();
        let mime_type = image.mime_type().to_string();

        let (page_id, settings) = self
            .with_workspace_mut(|ws| {
                let page = ws.collection.add_page(image, file_name);
                (page.id().clone(), ws.settings.clone())
            })
            .await;

        let request = AnalysisRequest {
            image: image_bytes,
            mime_type,
            settings,
            api_key,
        };

        let analyzer = Arc::clone(&self.analyzer);
        let workspace = Arc::clone(&self.workspace);
        let task_page_id = page_id.clone();
        let handle = tokio::spawn(async move {
            // A panicking analyzer still has to leave the page failed
            let result = tokio::spawn(async move { run_analysis(analyzer.as_ref(), &request).await })
                .await
                .unwrap_or_else(|e| {
                    error!("Analyzer for page {} ended abnormally: {}", task_page_id, e);
                    Err(AnalysisError::Transport(format!("analyzer ended: {e}")))
                });
            finish_analysis(&workspace, &task_page_id, result).await
        });

        PendingAnalysis { page_id, handle }
    }

    /// Make `id` the active page. Unknown ids are ignored.
    pub async fn select_page(&self, id: &PageId) -> bool {
        self.with_workspace_mut(|ws| ws.collection.select_page(id))
            .await
    }

    /// Remove a page. An analysis still running for it is discarded.
    pub async fn delete_page(&self, id: &PageId) -> bool {
        self.with_workspace_mut(|ws| ws.collection.delete_page(id).is_some())
            .await
    }

    // =========================================================================
    // Editing the active page
    // =========================================================================

    /// Change an item's translated text as the user types. Not undoable on its own.
    pub async fn edit_text(&self, item_id: u32, text: impl Into<String>) -> Result<()> {
        let edit = ContinuousEdit::TranslatedText(text.into());
        self.with_active_mut(|page| page.apply_continuous(item_id, edit))
            .await
    }

    /// End the current text edit session, checkpointing any change.
    pub async fn end_edit(&self) -> Result<bool> {
        self.with_active_mut(|page| Ok(page.commit())).await
    }

    pub async fn set_tone(&self, item_id: u32, tone: ToneType) -> Result<bool> {
        self.with_active_mut(|page| page.apply_discrete(DiscreteEdit::SetTone { item_id, tone }))
            .await
    }

    pub async fn delete_item(&self, item_id: u32) -> Result<bool> {
        self.with_active_mut(|page| page.apply_discrete(DiscreteEdit::DeleteItem { item_id }))
            .await
    }

    pub async fn undo(&self) -> Result<bool> {
        self.with_active_mut(|page| Ok(page.undo())).await
    }

    pub async fn redo(&self) -> Result<bool> {
        self.with_active_mut(|page| Ok(page.redo())).await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Genre used for new analyses and saved with auto-saved records.
    pub async fn set_genre(&self, genre: Genre) {
        self.with_workspace_mut(|ws| ws.settings.genre = genre).await;
    }

    /// Add a glossary entry; returns its id.
    pub async fn add_glossary_entry(&self, term: &str, translation: &str) -> Result<String> {
        self.with_workspace_mut(|ws| {
            ws.settings
                .add_glossary_entry(term, translation)
                .map(|entry| entry.id.clone())
        })
        .await
    }

    pub async fn remove_glossary_entry(&self, id: &str) -> bool {
        self.with_workspace_mut(|ws| ws.settings.remove_glossary_entry(id))
            .await
    }

    // =========================================================================
    // Persisted history
    // =========================================================================

    /// Persisted records, newest first.
    pub fn history(&self) -> Vec<PersistedHistoryRecord> {
        self.restore.list()
    }

    pub fn remove_history_record(&self, id: &str) -> Result<bool> {
        self.restore.remove(id)
    }

    /// Open a persisted record as a new active page and adopt its genre.
    pub async fn restore(&self, record_id: &str) -> Option<RestoredPage> {
        self.with_workspace_mut(|ws| {
            let restored = self.restore.restore(&mut ws.collection, record_id)?;
            ws.settings.genre = restored.genre;
            Some(restored)
        })
        .await
    }

    /// Save a pending auto-save right away. Returns whether one was saved.
    pub async fn flush(&self) -> bool {
        let mut workspace = self.workspace.write().await;
        workspace.autosave.flush()
    }

    pub async fn last_saved_at(&self) -> Option<i64> {
        self.with_workspace(Workspace::last_saved_at).await
    }

    /// Watch the auto-saved indicator.
    pub async fn subscribe_saves(&self) -> watch::Receiver<Option<i64>> {
        self.with_workspace(|ws| ws.autosave.subscribe()).await
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Render every page, in order, as a plain-text document.
    pub async fn export(&self) -> ExportedDocument {
        self.with_workspace(|ws| {
            let pages: Vec<ExportPage<'_>> = ws.collection.iter().map(ExportPage::from).collect();
            ExportedDocument {
                file_name: default_file_name(&pages),
                bytes: export_document(&pages),
            }
        })
        .await
    }

    /// Stored credential first, then the configured key.
    fn resolve_api_key(&self) -> Option<String> {
        self.credentials
            .active()
            .or_else(|| self.fallback_key.clone())
    }
}

async fn run_analysis(analyzer: &dyn Analyzer, request: &AnalysisRequest) -> AnalysisResult {
    if request.api_key.is_none() && analyzer.info().requires_api_key {
        return Err(AnalysisError::MissingCredential);
    }
    analyzer.analyze(request).await
}

/// Install an analysis result, unless the page has gone.
async fn finish_analysis(
    workspace: &RwLock<Workspace>,
    page_id: &PageId,
    result: AnalysisResult,
) -> AnalysisOutcome {
    let mut ws = workspace.write().await;

    let Some(page) = ws.collection.get_mut(page_id) else {
        debug!("Page {} was deleted during analysis, result discarded", page_id);
        return AnalysisOutcome::Discarded;
    };

    let outcome = match result {
        Ok(items) => {
            let count = items.len();
            page.complete_analysis(items);
            info!("Page {} analyzed: {} items", page_id, count);
            AnalysisOutcome::Analyzed { items: count }
        }
        Err(error) => {
            page.fail_analysis();
            warn!("Page {} analysis failed ({}): {}", page_id, error.reason(), error);
            AnalysisOutcome::Failed {
                message: error.user_message(),
                error,
            }
        }
    };

    ws.observe();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerInfo;
    use crate::model::TranslationType;
    use crate::page::AnalysisState;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct FixedAnalyzer;

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        fn info(&self) -> AnalyzerInfo {
            AnalyzerInfo {
                name: "Fixed",
                requires_api_key: true,
            }
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> AnalysisResult {
            Ok(vec![
                TranslationItem::new(1, "Hi", "سلام", TranslationType::Bubble, ToneType::Casual),
                TranslationItem::new(2, "Bye", "خداحافظ", TranslationType::Bubble, ToneType::Casual),
            ])
        }
    }

    struct PanickingAnalyzer;

    #[async_trait]
    impl Analyzer for PanickingAnalyzer {
        fn info(&self) -> AnalyzerInfo {
            AnalyzerInfo {
                name: "Panicking",
                requires_api_key: false,
            }
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> AnalysisResult {
            panic!("analyzer bug");
        }
    }

    fn editor(api_key: Option<&str>) -> Editor {
        let mut config = AppConfig::default();
        config.analyzer.api_key = api_key.map(str::to_string);
        Editor::new(&config, Arc::new(MemoryStore::new()), Arc::new(FixedAnalyzer))
    }

    fn image() -> PageImage {
        PageImage::new(vec![1, 2, 3], "image/png")
    }

    #[tokio::test]
    async fn test_add_page_analyzes() {
        let editor = editor(Some("key"));
        let pending = editor.add_page(image(), "01.png").await;
        let page_id = pending.page_id.clone();

        assert_eq!(pending.wait().await, AnalysisOutcome::Analyzed { items: 2 });
        assert_eq!(editor.active_page_id().await, Some(page_id));
        assert_eq!(editor.active_translations().await.map(|t| t.len()), Some(2));
    }

    #[tokio::test]
    async fn test_missing_key_fails_page() {
        let editor = editor(None);
        let outcome = editor.add_page(image(), "01.png").await.wait().await;

        let AnalysisOutcome::Failed { error, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(error.requires_credential());
    }

    #[tokio::test]
    async fn test_panicking_analyzer_fails_page() {
        let editor = Editor::new(
            &AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(PanickingAnalyzer),
        );
        let pending = editor.add_page(image(), "01.png").await;
        let page_id = pending.page_id.clone();

        let outcome = pending.wait().await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed {
                error: AnalysisError::Transport(_),
                ..
            }
        ));

        let state = editor
            .with_workspace(|ws| ws.collection().get(&page_id).map(Page::state))
            .await;
        assert_eq!(state, Some(AnalysisState::Failed));

        // No longer locked as analyzing
        assert!(matches!(
            editor.set_tone(1, ToneType::Formal).await,
            Err(Error::ItemNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stored_credential_wins() {
        let editor = editor(None);
        editor.credentials().set_active("stored").unwrap();
        let outcome = editor.add_page(image(), "01.png").await.wait().await;
        assert_eq!(outcome, AnalysisOutcome::Analyzed { items: 2 });
    }

    #[tokio::test]
    async fn test_edit_commit_undo() {
        let editor = editor(Some("key"));
        editor.add_page(image(), "01.png").await.wait().await;

        editor.edit_text(1, "درود").await.unwrap();
        editor.edit_text(1, "درود!").await.unwrap();
        assert!(editor.end_edit().await.unwrap());
        assert!(!editor.end_edit().await.unwrap());

        editor.set_tone(2, ToneType::Angry).await.unwrap();
        editor.delete_item(1).await.unwrap();
        assert_eq!(editor.active_translations().await.map(|t| t.len()), Some(1));

        assert!(editor.undo().await.unwrap());
        assert!(editor.undo().await.unwrap());
        let items = editor.active_translations().await.unwrap();
        assert_eq!(items[0].translated_text, "درود!");
        assert_eq!(items[1].tone, ToneType::Casual);

        assert!(editor.redo().await.unwrap());
        assert!(editor.redo().await.unwrap());
        assert!(!editor.redo().await.unwrap());
    }

    #[tokio::test]
    async fn test_edit_without_page() {
        let editor = editor(Some("key"));
        assert!(matches!(editor.undo().await, Err(Error::NoActivePage)));
        assert!(matches!(
            editor.edit_text(1, "x").await,
            Err(Error::NoActivePage)
        ));
    }

    #[tokio::test]
    async fn test_export_in_page_order() {
        let editor = editor(Some("key"));
        editor.add_page(image(), "01.png").await.wait().await;
        editor.add_page(image(), "02.png").await.wait().await;

        let doc = editor.export().await;
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.starts_with("01.png\n\n"));
        assert!(text.contains("\x0C02.png\n\n"));
        assert!(doc.file_name.starts_with("Manhua_Translations_"));
    }

    #[tokio::test]
    async fn test_glossary_changes() {
        let editor = editor(Some("key"));
        let id = editor.add_glossary_entry("Sect Leader", "پیشوای فرقه").await.unwrap();
        assert!(editor.settings().await.glossary.iter().any(|e| e.id == id));
        assert!(editor.remove_glossary_entry(&id).await);
        assert!(editor.add_glossary_entry(" ", "x").await.is_err());
    }
}
