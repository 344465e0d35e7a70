//! Translation items: one detected text unit on a page plus its editable translation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a detected text unit.
///
/// Serialized by name. Deserialization also accepts the localized labels the
/// vision model is asked to emit, and lowercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslationType {
    #[serde(rename = "BUBBLE", alias = "bubble", alias = "گفتگو")]
    Bubble,
    #[serde(rename = "THOUGHT", alias = "thought", alias = "افکار")]
    Thought,
    #[serde(rename = "SFX", alias = "sfx", alias = "افکت صوتی")]
    Sfx,
    #[serde(rename = "NARRATION", alias = "narration", alias = "راوی")]
    Narration,
    #[serde(rename = "OTHER", alias = "other", alias = "سایر")]
    Other,
}

impl TranslationType {
    pub const ALL: [Self; 5] = [
        Self::Bubble,
        Self::Thought,
        Self::Sfx,
        Self::Narration,
        Self::Other,
    ];

    /// Localized label shown to translators.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bubble => "گفتگو",
            Self::Thought => "افکار",
            Self::Sfx => "افکت صوتی",
            Self::Narration => "راوی",
            Self::Other => "سایر",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bubble => "BUBBLE",
            Self::Thought => "THOUGHT",
            Self::Sfx => "SFX",
            Self::Narration => "NARRATION",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for TranslationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register of a translated line. Editable by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToneType {
    #[serde(rename = "CASUAL", alias = "casual", alias = "عامیانه")]
    Casual,
    #[serde(rename = "FORMAL", alias = "formal", alias = "رسمی")]
    Formal,
    #[serde(rename = "ANGRY", alias = "angry", alias = "عصبانی")]
    Angry,
    #[serde(rename = "SCARED", alias = "scared", alias = "ترسیده")]
    Scared,
}

impl ToneType {
    pub const ALL: [Self; 4] = [Self::Casual, Self::Formal, Self::Angry, Self::Scared];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Casual => "عامیانه",
            Self::Formal => "رسمی",
            Self::Angry => "عصبانی",
            Self::Scared => "ترسیده",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Casual => "CASUAL",
            Self::Formal => "FORMAL",
            Self::Angry => "ANGRY",
            Self::Scared => "SCARED",
        }
    }

    /// Parse a tone from user input (name in any case, or localized label).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(name) || tone.label() == name)
    }
}

impl fmt::Display for ToneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected text unit and its translation.
///
/// `id`, `original_text`, `kind` and `notes` come from analysis and never
/// change; `translated_text` and `tone` are what the user edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationItem {
    pub id: u32,
    pub original_text: String,
    pub translated_text: String,
    #[serde(rename = "type")]
    pub kind: TranslationType,
    pub tone: ToneType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TranslationItem {
    pub fn new(
        id: u32,
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        kind: TranslationType,
        tone: ToneType,
    ) -> Self {
        Self {
            id,
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            kind,
            tone,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Make item ids unique within one list.
///
/// Ids the model already made unique are kept. Any repeated id is replaced
/// with the next id above the current maximum. Returns how many were changed,
/// or `None` when no id is left above the maximum.
pub fn ensure_unique_ids(items: &mut [TranslationItem]) -> Option<usize> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    let mut next = items.iter().map(|item| item.id).max().unwrap_or(0);
    let mut changed = 0;

    for item in items.iter_mut() {
        if !seen.insert(item.id) {
            next = next.checked_add(1)?;
            item.id = next;
            seen.insert(next);
            changed += 1;
        }
    }

    Some(changed)
}
