//! A single uploaded page: its image, its translation items and their history.
//!
//! ## Commit timing
//!
//! Edits come in two flavours with different postconditions:
//!
//! - [`Page::apply_continuous`] changes a field as the user types. History is
//!   not touched; the caller commits once the edit session ends (field blur)
//!   with [`Page::commit`].
//! - [`Page::apply_discrete`] applies a one-shot change (tone, deletion) and
//!   commits it in the same step, so each one is undoable on its own.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::history::{DEFAULT_HISTORY_CAPACITY, PageHistoryLog};
use crate::model::{ToneType, TranslationItem};

/// Unique page identifier: creation time in millis plus a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for a freshly uploaded page.
    pub fn generate() -> Self {
        Self(format!("{}{}", crate::util::now_millis(), random_suffix(5)))
    }

    /// Id for a page rebuilt from persisted history.
    pub fn restored() -> Self {
        Self(format!(
            "{}-restored-{}",
            crate::util::now_millis(),
            random_suffix(4)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn random_suffix(len: usize) -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(len);
    suffix
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw image bytes owned by exactly one page.
///
/// Not `Clone`: the bytes go with the page and are dropped with it.
#[derive(Debug)]
pub struct PageImage {
    bytes: Bytes,
    mime_type: String,
}

impl PageImage {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle to the same buffer, for the page's own analysis request.
    pub(crate) fn shared_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A keystroke-level change. Never creates a checkpoint by itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuousEdit {
    TranslatedText(String),
}

/// A one-shot change that is committed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscreteEdit {
    SetTone { item_id: u32, tone: ToneType },
    DeleteItem { item_id: u32 },
}

impl DiscreteEdit {
    const fn item_id(self) -> u32 {
        match self {
            Self::SetTone { item_id, .. } | Self::DeleteItem { item_id } => item_id,
        }
    }
}

/// Where a page is in its analysis lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Analyzing,
    Analyzed,
    Failed,
    /// Rebuilt from persisted history, never analyzed in this session
    Restored,
}

#[derive(Debug)]
pub struct Page {
    id: PageId,
    image: Option<PageImage>,
    source_file_name: String,
    translations: Vec<TranslationItem>,
    state: AnalysisState,
    history: PageHistoryLog,
}

impl Page {
    /// A new upload: empty, analyzing, history seeded with the empty list.
    pub fn new(id: PageId, image: PageImage, source_file_name: impl Into<String>) -> Self {
        Self::with_history_capacity(id, image, source_file_name, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(
        id: PageId,
        image: PageImage,
        source_file_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            image: Some(image),
            source_file_name: source_file_name.into(),
            translations: Vec::new(),
            state: AnalysisState::Analyzing,
            history: PageHistoryLog::with_capacity(Vec::new(), capacity),
        }
    }

    /// A page rebuilt from a persisted snapshot. It has no image.
    pub fn restored(
        id: PageId,
        source_file_name: impl Into<String>,
        translations: Vec<TranslationItem>,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            image: None,
            source_file_name: source_file_name.into(),
            history: PageHistoryLog::with_capacity(translations.clone(), capacity),
            translations,
            state: AnalysisState::Restored,
        }
    }

    pub const fn id(&self) -> &PageId {
        &self.id
    }

    pub const fn image(&self) -> Option<&PageImage> {
        self.image.as_ref()
    }

    pub fn source_file_name(&self) -> &str {
        &self.source_file_name
    }

    pub fn translations(&self) -> &[TranslationItem] {
        &self.translations
    }

    pub fn item(&self, item_id: u32) -> Option<&TranslationItem> {
        self.translations.iter().find(|item| item.id == item_id)
    }

    pub const fn history(&self) -> &PageHistoryLog {
        &self.history
    }

    pub const fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn is_analyzing(&self) -> bool {
        self.state == AnalysisState::Analyzing
    }

    /// True when the in-flight list differs from the committed snapshot.
    pub fn has_uncommitted_changes(&self) -> bool {
        self.history.current().as_slice() != self.translations.as_slice()
    }

    pub const fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // =========================================================================
    // Analysis lifecycle
    // =========================================================================

    /// Install the analysis result and restart history from it.
    pub fn complete_analysis(&mut self, translations: Vec<TranslationItem>) {
        self.history.reset(translations.clone());
        self.translations = translations;
        self.state = AnalysisState::Analyzed;
        debug!(
            "Page {} analyzed with {} items",
            self.id,
            self.translations.len()
        );
    }

    /// Leave translations and history at the placeholder.
    pub fn fail_analysis(&mut self) {
        self.state = AnalysisState::Failed;
        debug!("Page {} analysis failed", self.id);
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Apply a keystroke-level edit without touching history.
    pub fn apply_continuous(&mut self, item_id: u32, edit: ContinuousEdit) -> Result<()> {
        self.ensure_editable()?;
        let item = self.item_mut(item_id)?;
        match edit {
            ContinuousEdit::TranslatedText(text) => item.translated_text = text,
        }
        Ok(())
    }

    /// Apply a one-shot edit and commit it. Returns whether a checkpoint was added.
    pub fn apply_discrete(&mut self, edit: DiscreteEdit) -> Result<bool> {
        self.ensure_editable()?;
        // Validate before mutating so a bad id leaves the page untouched
        self.item_mut(edit.item_id())?;

        match edit {
            DiscreteEdit::SetTone { item_id, tone } => {
                if let Some(item) = self.translations.iter_mut().find(|i| i.id == item_id) {
                    item.tone = tone;
                }
            }
            DiscreteEdit::DeleteItem { item_id } => {
                self.translations.retain(|item| item.id != item_id);
            }
        }

        Ok(self.commit())
    }

    /// End an edit session: checkpoint the current list if it changed.
    pub fn commit(&mut self) -> bool {
        self.history.commit(&self.translations)
    }

    /// Restore the previous checkpoint. Returns whether anything changed.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.translations = snapshot.clone();
                true
            }
            None => false,
        }
    }

    /// Re-apply the next checkpoint. Returns whether anything changed.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.translations = snapshot.clone();
                true
            }
            None => false,
        }
    }

    /// Drop the image bytes. Called when the page leaves the collection.
    pub(crate) fn release_image(&mut self) -> Option<PageImage> {
        self.image.take()
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.is_analyzing() {
            return Err(Error::PageAnalyzing(self.id.to_string()));
        }
        Ok(())
    }

    fn item_mut(&mut self, item_id: u32) -> Result<&mut TranslationItem> {
        let page = &self.id;
        self.translations
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| Error::ItemNotFound {
                page: page.to_string(),
                item: item_id,
            })
    }
}
