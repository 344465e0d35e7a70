//! Project settings passed to every analysis call: genre, glossary, model.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Default vision model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Story genre. Steers the register of the translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    #[serde(alias = "مدرن / روزمره (Modern Slice of Life)")]
    Modern,
    #[serde(alias = "مدرسه ای / گنگستری (School Life / Bullying)")]
    School,
    #[serde(alias = "تاریخی / رزمی (Murim / Wuxia)")]
    Wuxia,
    #[serde(alias = "سلطنتی / درباری (Royal Court / Historical)")]
    Royal,
    #[serde(alias = "افسانه ای / جاودانگی (Xianxia / High Fantasy)")]
    Xianxia,
    #[default]
    #[serde(alias = "سیستم / لول آپ (System / Dungeon)")]
    System,
    #[serde(alias = "تهذیب در دنیای مدرن (Urban Cultivation)")]
    UrbanCultivation,
    #[serde(alias = "عاشقانه / شوجو (Romance / Shoujo)")]
    Romance,
    #[serde(alias = "کمدی (Comedy)")]
    Comedy,
}

impl Genre {
    pub const ALL: [Self; 9] = [
        Self::Modern,
        Self::School,
        Self::Wuxia,
        Self::Royal,
        Self::Xianxia,
        Self::System,
        Self::UrbanCultivation,
        Self::Romance,
        Self::Comedy,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Modern => "MODERN",
            Self::School => "SCHOOL",
            Self::Wuxia => "WUXIA",
            Self::Royal => "ROYAL",
            Self::Xianxia => "XIANXIA",
            Self::System => "SYSTEM",
            Self::UrbanCultivation => "URBAN_CULTIVATION",
            Self::Romance => "ROMANCE",
            Self::Comedy => "COMEDY",
        }
    }

    /// Display label for genre pickers.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Modern => "Modern Slice of Life",
            Self::School => "School Life / Bullying",
            Self::Wuxia => "Murim / Wuxia",
            Self::Royal => "Royal Court / Historical",
            Self::Xianxia => "Xianxia / High Fantasy",
            Self::System => "System / Dungeon",
            Self::UrbanCultivation => "Urban Cultivation",
            Self::Romance => "Romance / Shoujo",
            Self::Comedy => "Comedy",
        }
    }

    /// Accepts `URBAN_CULTIVATION`, `urban-cultivation`, `urban_cultivation`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|genre| genre.as_str().eq_ignore_ascii_case(&normalized))
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mandatory term translation applied by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub id: String,
    pub term: String,
    pub translation: String,
}

impl GlossaryEntry {
    pub fn new(id: impl Into<String>, term: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            term: term.into(),
            translation: translation.into(),
        }
    }
}

/// Settings handed to the analyzer with each page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub genre: Genre,
    #[serde(default = "default_glossary")]
    pub glossary: Vec<GlossaryEntry>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            genre: Genre::default(),
            glossary: default_glossary(),
            model: default_model(),
        }
    }
}

impl ProjectSettings {
    /// Add a glossary entry. Both sides are trimmed and must be non-empty.
    pub fn add_glossary_entry(&mut self, term: &str, translation: &str) -> Result<&GlossaryEntry> {
        let (term, translation) = (term.trim(), translation.trim());
        if term.is_empty() || translation.is_empty() {
            return Err(Error::InvalidInput(
                "glossary term and translation must not be blank".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        self.glossary.push(GlossaryEntry::new(id, term, translation));
        Ok(&self.glossary[self.glossary.len() - 1])
    }

    /// Remove a glossary entry by id. Returns whether one was removed.
    pub fn remove_glossary_entry(&mut self, id: &str) -> bool {
        let before = self.glossary.len();
        self.glossary.retain(|entry| entry.id != id);
        self.glossary.len() != before
    }

    /// Case-insensitive match on the term, plain match on the translation.
    pub fn search_glossary<'a>(&'a self, query: &str) -> Vec<&'a GlossaryEntry> {
        let needle = query.to_lowercase();
        self.glossary
            .iter()
            .filter(|entry| {
                entry.term.to_lowercase().contains(&needle) || entry.translation.contains(query)
            })
            .collect()
    }
}

/// Starter glossary of recurring manhua terms.
pub fn default_glossary() -> Vec<GlossaryEntry> {
    const ENTRIES: &[(&str, &str, &str)] = &[
        // System / game terms
        ("sys1", "System", "سیستم"),
        ("sys2", "Quest", "ماموریت"),
        ("sys3", "Hidden Quest", "ماموریت مخفی"),
        ("sys4", "Skill", "مهارت"),
        ("sys5", "Active Skill", "مهارت فعال"),
        ("sys6", "Passive Skill", "مهارت غیرفعال"),
        ("sys7", "Inventory", "اینونتوری / کوله پشتی"),
        ("sys8", "Status Window", "پنجره وضعیت"),
        ("sys9", "Stats", "آمار / وضعیت"),
        ("sys10", "Agility", "چابکی"),
        ("sys11", "Strength", "قدرت"),
        ("sys12", "Intelligence", "هوش"),
        ("sys13", "Mana", "مانا"),
        ("sys14", "Guild", "گیلد / انجمن"),
        ("sys15", "Dungeon", "دانجن / سیاهچاله"),
        ("sys16", "Boss", "باس / رئیس"),
        ("sys17", "Cooldown", "زمان انتظار / کول‌داون"),
        ("sys18", "NPC", "شخصیت غیرقابل بازی (NPC)"),
        ("sys19", "Level Up", "ارتقای سطح"),
        // Cultivation / murim
        ("cult1", "Qi", "چی"),
        ("cult2", "Internal Energy", "انرژی درونی"),
        ("cult3", "Cultivation", "تهذیب"),
        ("cult4", "Sect", "فرقه"),
        ("cult5", "Clan", "خاندان"),
        ("cult6", "Elder", "ارشد / ریش‌سفید"),
        ("cult7", "Sect Leader", "رهبر فرقه"),
        ("cult8", "Young Master", "ارباب جوان"),
        ("cult9", "Disciple", "شاگرد"),
        ("cult10", "Senior Brother", "برادر ارشد"),
        ("cult11", "Junior Sister", "خواهر کوچکتر"),
        ("cult12", "Dao", "دائو"),
        ("cult13", "Dantian", "دانتیان"),
        ("cult14", "Meridians", "مریدین‌ها / رگ‌های انرژی"),
        ("cult15", "Tribulation", "عذاب آسمانی"),
        ("cult16", "Immortal", "جاودانه"),
        ("cult17", "Demon Sect", "فرقه شیطانی"),
        // Royal / historical
        ("roy1", "Your Majesty", "اعلی‌حضرت"),
        ("roy2", "Imperial Decree", "فرمان امپراتور"),
        ("roy3", "Eunuch", "خواجه"),
        ("roy4", "Concubine", "صیغه سلطنتی"),
        ("roy5", "Empress", "ملکه"),
        // Honorifics
        ("gen1", "Oppa", "داداشی / اوپا"),
        ("gen2", "Hyung", "هیونگ / داداش"),
        ("gen3", "Noona", "نونا / آبجی"),
        ("gen4", "Sunbae", "ارشد"),
        // Places and techniques
        ("place1", "Mount Hua", "کوه هوآ"),
        ("place2", "Capital", "پایتخت"),
        ("place3", "Inner Court", "دربار داخلی"),
        ("tech1", "Sword Intent", "قصد شمشیر"),
        ("tech2", "Fist Technique", "تکنیک مشت"),
        ("tech3", "Divine Art", "هنر الهی"),
        ("tech4", "Formation", "آرایه / طلسم"),
    ];

    ENTRIES
        .iter()
        .map(|(id, term, translation)| GlossaryEntry::new(*id, *term, *translation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.genre, Genre::System);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert!(!settings.glossary.is_empty());
    }

    #[test]
    fn test_genre_from_name() {
        assert_eq!(Genre::from_name("wuxia"), Some(Genre::Wuxia));
        assert_eq!(Genre::from_name("urban-cultivation"), Some(Genre::UrbanCultivation));
        assert_eq!(Genre::from_name("space opera"), None);
    }

    #[test]
    fn test_genre_accepts_legacy_label() {
        let genre: Genre = serde_json::from_str("\"کمدی (Comedy)\"").unwrap();
        assert_eq!(genre, Genre::Comedy);
        assert_eq!(serde_json::to_string(&Genre::UrbanCultivation).unwrap(), "\"URBAN_CULTIVATION\"");
    }

    #[test]
    fn test_add_glossary_entry_trims_and_rejects_blank() {
        let mut settings = ProjectSettings {
            glossary: Vec::new(),
            ..Default::default()
        };

        let entry = settings.add_glossary_entry("  Sword Saint ", " شمشیرزن مقدس ").unwrap();
        assert_eq!(entry.term, "Sword Saint");
        assert_eq!(entry.translation, "شمشیرزن مقدس");

        assert!(settings.add_glossary_entry("   ", "x").is_err());
        assert_eq!(settings.glossary.len(), 1);
    }

    #[test]
    fn test_remove_and_search_glossary() {
        let mut settings = ProjectSettings::default();
        assert!(settings.remove_glossary_entry("sys1"));
        assert!(!settings.remove_glossary_entry("sys1"));

        let hits = settings.search_glossary("sect");
        let terms: Vec<&str> = hits.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["Sect", "Sect Leader", "Demon Sect"]);
    }
}
