//! Plain-text document export.
//!
//! Each page becomes its file name as a heading, a blank line, then every
//! translated text followed by a blank line. Pages are separated by a form
//! feed so printers and pagers break between them.

use std::path::Path;

use crate::model::TranslationItem;
use crate::page::Page;
use crate::store::PersistedHistoryRecord;

/// Page separator in exported documents
pub const PAGE_BREAK: char = '\x0C';

/// The parts of a page an export reads.
#[derive(Debug, Clone, Copy)]
pub struct ExportPage<'a> {
    pub file_name: &'a str,
    pub translations: &'a [TranslationItem],
}

impl<'a> From<&'a Page> for ExportPage<'a> {
    fn from(page: &'a Page) -> Self {
        Self {
            file_name: page.source_file_name(),
            translations: page.translations(),
        }
    }
}

impl<'a> From<&'a PersistedHistoryRecord> for ExportPage<'a> {
    fn from(record: &'a PersistedHistoryRecord) -> Self {
        Self {
            file_name: &record.file_name,
            translations: &record.translations,
        }
    }
}

/// Render pages, in order, into a UTF-8 document.
pub fn export_document(pages: &[ExportPage<'_>]) -> Vec<u8> {
    let mut out = String::new();

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            out.push(PAGE_BREAK);
        }
        out.push_str(page.file_name);
        out.push_str("\n\n");
        for item in page.translations {
            out.push_str(&item.translated_text);
            out.push_str("\n\n");
        }
    }

    out.into_bytes()
}

/// Suggested file name for an export of `pages`.
pub fn default_file_name(pages: &[ExportPage<'_>]) -> String {
    if let [page] = pages {
        let stem = Path::new(page.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("page");
        return format!("Translation_{stem}.txt");
    }

    format!(
        "Manhua_Translations_{}.txt",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToneType, TranslationType};

    fn items(texts: &[&str]) -> Vec<TranslationItem> {
        texts
            .iter()
            .zip(1..)
            .map(|(text, id)| {
                TranslationItem::new(id, "orig", *text, TranslationType::Bubble, ToneType::Casual)
            })
            .collect()
    }

    #[test]
    fn test_export_single_page() {
        let translations = items(&["سلام", "خداحافظ"]);
        let pages = [ExportPage {
            file_name: "01.png",
            translations: &translations,
        }];

        let text = String::from_utf8(export_document(&pages)).unwrap();
        assert_eq!(text, "01.png\n\nسلام\n\nخداحافظ\n\n");
    }

    #[test]
    fn test_export_breaks_between_pages() {
        let first = items(&["a"]);
        let second = items(&[]);
        let pages = [
            ExportPage {
                file_name: "01.png",
                translations: &first,
            },
            ExportPage {
                file_name: "02.png",
                translations: &second,
            },
        ];

        let text = String::from_utf8(export_document(&pages)).unwrap();
        assert_eq!(text, "01.png\n\na\n\n\x0C02.png\n\n");
        assert_eq!(text.matches(PAGE_BREAK).count(), 1);
    }

    #[test]
    fn test_default_file_name() {
        let none = items(&[]);
        let one = [ExportPage {
            file_name: "chapter-3.webp",
            translations: &none,
        }];
        assert_eq!(default_file_name(&one), "Translation_chapter-3.txt");

        let two = [one[0], one[0]];
        let name = default_file_name(&two);
        assert!(name.starts_with("Manhua_Translations_"));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn test_export_nothing() {
        assert!(export_document(&[]).is_empty());
    }
}
