//! Integration tests for manhua-core
//!
//! These tests drive the editor end to end with a mock analyzer:
//! - Page creation, analysis and failure isolation
//! - Deleting a page while its analysis is in flight
//! - Debounced auto-save into persisted history
//! - Restoring persisted pages and exporting documents

use async_trait::async_trait;
use manhua_core::{
    AnalysisError, AnalysisOutcome, AnalysisRequest, Analyzer, AnalyzerInfo, AppConfig, Editor, Genre,
    KeyValueStore, MemoryStore, PageImage, SledStore, ToneType, TranslationItem, TranslationType,
    analyzer::AnalysisResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

// =============================================================================
// Mock Analyzer for Testing
// =============================================================================

/// Image bytes that make the mock analyzer fail
const FAILING_IMAGE: &[u8] = b"unreadable";

/// A mock analyzer that returns predictable items without network calls.
struct MockAnalyzer {
    /// When set, each analysis waits for a permit
    gate: Option<Arc<Semaphore>>,
    requires_api_key: bool,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    fn new() -> Self {
        Self {
            gate: None,
            requires_api_key: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn requiring_key() -> Self {
        Self {
            requires_api_key: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn info(&self) -> AnalyzerInfo {
        AnalyzerInfo {
            name: "mock",
            requires_api_key: self.requires_api_key,
        }
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        if &request.image[..] == FAILING_IMAGE {
            return Err(AnalysisError::Transport("mock network failure".to_string()));
        }

        Ok(vec![
            TranslationItem::new(1, "Who are you?", "تو کی هستی؟", TranslationType::Bubble, ToneType::Casual),
            TranslationItem::new(2, "WHOOSH", "ووش!", TranslationType::Sfx, ToneType::Angry),
        ])
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.store.in_memory = true;
    config.analyzer.api_key = Some("test-key".to_string());
    config
}

fn editor_with(analyzer: MockAnalyzer, store: Arc<dyn KeyValueStore>) -> Editor {
    Editor::new(&test_config(), store, Arc::new(analyzer))
}

fn editor() -> Editor {
    editor_with(MockAnalyzer::new(), Arc::new(MemoryStore::new()))
}

fn image() -> PageImage {
    PageImage::new(b"\x89PNG page".to_vec(), "image/png")
}

// =============================================================================
// Analysis Tests
// =============================================================================

#[tokio::test]
async fn test_failed_analysis_is_isolated() {
    let editor = editor();

    let good = editor.add_page(image(), "01.png").await;
    let bad = editor
        .add_page(PageImage::new(FAILING_IMAGE.to_vec(), "image/png"), "02.png")
        .await;
    let (good_id, bad_id) = (good.page_id.clone(), bad.page_id.clone());

    let (good_outcome, bad_outcome) = tokio::join!(good.wait(), bad.wait());
    assert_eq!(good_outcome, AnalysisOutcome::Analyzed { items: 2 });
    let AnalysisOutcome::Failed { error, message } = bad_outcome else {
        panic!("second page should fail");
    };
    assert_eq!(error.reason(), "transport");
    assert!(!message.is_empty());

    editor
        .with_workspace(|ws| {
            let good = ws.collection().get(&good_id).unwrap();
            assert_eq!(good.translations().len(), 2);
            assert_eq!(good.history().len(), 1);

            let bad = ws.collection().get(&bad_id).unwrap();
            assert!(!bad.is_analyzing());
            assert!(bad.translations().is_empty());
            assert_eq!(bad.history().len(), 1);
            assert!(bad.history().current().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_missing_credential_skips_analyzer() {
    let mut config = test_config();
    config.analyzer.api_key = None;
    let analyzer = Arc::new(MockAnalyzer::requiring_key());
    let editor = Editor::new(&config, Arc::new(MemoryStore::new()), analyzer.clone());

    let outcome = editor.add_page(image(), "01.png").await.wait().await;
    let AnalysisOutcome::Failed { error, .. } = outcome else {
        panic!("analysis without a key should fail");
    };
    assert_eq!(error, AnalysisError::MissingCredential);
    assert!(error.requires_credential());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_delete_during_analysis_is_discarded() {
    let gate = Arc::new(Semaphore::new(0));
    let editor = editor_with(MockAnalyzer::gated(gate.clone()), Arc::new(MemoryStore::new()));

    let first = editor.add_page(image(), "01.png").await;
    let pending = editor.add_page(image(), "02.png").await;
    assert!(editor.delete_page(&pending.page_id).await);

    gate.add_permits(2);

    assert_eq!(pending.wait().await, AnalysisOutcome::Discarded);
    assert_eq!(first.wait().await, AnalysisOutcome::Analyzed { items: 2 });

    editor
        .with_workspace(|ws| {
            assert_eq!(ws.collection().len(), 1);
            assert_eq!(ws.active().map(|p| p.source_file_name()), Some("01.png"));
        })
        .await;
}

#[tokio::test]
async fn test_editing_while_analyzing_is_rejected() {
    let gate = Arc::new(Semaphore::new(0));
    let editor = editor_with(MockAnalyzer::gated(gate.clone()), Arc::new(MemoryStore::new()));

    let pending = editor.add_page(image(), "01.png").await;
    assert!(matches!(
        editor.set_tone(1, ToneType::Formal).await,
        Err(manhua_core::Error::PageAnalyzing(_))
    ));

    gate.add_permits(1);
    pending.wait().await;
    assert!(editor.set_tone(1, ToneType::Formal).await.unwrap());
}

// =============================================================================
// Auto-save Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_typing_burst_saves_once() {
    let editor = editor();
    editor.add_page(image(), "01.png").await.wait().await;

    for text in ["س", "سل", "سلا"] {
        editor.edit_text(1, text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert!(editor.history().is_empty());

    tokio::time::sleep(Duration::from_millis(1600)).await;
    let records = editor.history();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_name, "01.png");
    assert_eq!(records[0].translations[0].translated_text, "سلا");
    assert!(editor.last_saved_at().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_flush_saves_pending_edit() {
    let editor = editor();
    editor.add_page(image(), "01.png").await.wait().await;
    editor.set_tone(2, ToneType::Scared).await.unwrap();

    assert!(editor.flush().await);
    let records = editor.history();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].translations[1].tone, ToneType::Scared);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_active_page_cancels_save() {
    let editor = editor();
    let pending = editor.add_page(image(), "01.png").await;
    let page_id = pending.page_id.clone();
    pending.wait().await;

    editor.delete_page(&page_id).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(editor.history().is_empty());
}

// =============================================================================
// Restore & Export Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_restore_in_new_session() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let first = editor_with(MockAnalyzer::new(), Arc::clone(&store));
    first.set_genre(Genre::Wuxia).await;
    first.add_page(image(), "chapter1.png").await.wait().await;
    first.delete_item(2).await.unwrap();
    assert!(first.flush().await);
    let record_id = first.history()[0].id.clone();

    let second = editor_with(MockAnalyzer::new(), store);
    assert_eq!(second.settings().await.genre, Genre::System);

    let restored = second.restore(&record_id).await.unwrap();
    assert_eq!(restored.genre, Genre::Wuxia);
    assert_eq!(second.settings().await.genre, Genre::Wuxia);
    assert_eq!(second.active_page_id().await, Some(restored.page_id.clone()));

    let items = second.active_translations().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, 1);

    // A restored page starts a fresh history and edits normally
    assert!(!second.undo().await.unwrap());
    second.set_tone(1, ToneType::Formal).await.unwrap();
    assert!(second.undo().await.unwrap());

    assert!(second.restore("missing").await.is_none());
}

#[tokio::test]
async fn test_autosave_writes_through_sled() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledStore::open(dir.path().join("store")).unwrap());

    let editor = editor_with(MockAnalyzer::new(), store.clone());
    editor.add_page(image(), "01.png").await.wait().await;
    assert!(editor.flush().await);

    let json = store.get("history").unwrap().unwrap();
    assert!(json.contains("\"fileName\":\"01.png\""));
    assert!(!store.is_empty());
}

#[tokio::test]
async fn test_export_document() {
    let editor = editor();
    editor.add_page(image(), "01.png").await.wait().await;
    editor.edit_text(1, "سلام").await.unwrap();
    editor.end_edit().await.unwrap();

    let doc = editor.export().await;
    assert_eq!(doc.file_name, "Translation_01.txt");
    assert_eq!(
        String::from_utf8(doc.bytes).unwrap(),
        "01.png\n\nسلام\n\nووش!\n\n"
    );
}
