//! Prompt assembly for the vision model.

use std::fmt::Write as _;

use crate::settings::{Genre, ProjectSettings};

/// Register guidance per genre.
fn genre_guidance(genre: Genre) -> &'static str {
    match genre {
        Genre::Wuxia => {
            "GENRE: Murim / Wuxia. Martial sects and clans. Use period-appropriate, \
             respectful Persian; juniors address seniors in the plural."
        }
        Genre::Royal => {
            "GENRE: Royal court. Highly formal, flowery Persian; plural verbs for anyone of higher rank."
        }
        Genre::Xianxia => {
            "GENRE: Xianxia. Cultivation and immortality; keep cultivation terms consistent."
        }
        Genre::System => {
            "GENRE: System / Dungeon. Game-like system messages stay short and mechanical; \
             dialogue is casual and modern."
        }
        Genre::UrbanCultivation => {
            "GENRE: Urban cultivation. Modern slang in dialogue, cultivation terms kept intact."
        }
        Genre::School => "GENRE: School life. Teen slang, rough tone for bullies.",
        Genre::Romance => "GENRE: Romance. Soft, emotional phrasing; avoid literal sibling terms between lovers.",
        Genre::Comedy => "GENRE: Comedy. Localize jokes so they land in Persian.",
        Genre::Modern => "GENRE: Modern slice of life. Natural spoken Persian.",
    }
}

/// Build the instruction text sent alongside the page image.
pub fn build_prompt(settings: &ProjectSettings) -> String {
    let mut prompt = String::from(
        "ROLE: Professional manhua/manhwa translator specializing in Persian localization.\n\
         OBJECTIVE: Extract every text unit from the image and translate it into natural Persian.\n\n",
    );

    prompt.push_str(genre_guidance(settings.genre));
    prompt.push_str("\n\n");

    if !settings.glossary.is_empty() {
        prompt.push_str("MANDATORY GLOSSARY (overrides all other rules):\n");
        for entry in &settings.glossary {
            let _ = writeln!(prompt, "- \"{}\" -> \"{}\"", entry.term, entry.translation);
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "OUTPUT: a JSON array of objects with id (starting from 1), originalText, translatedText, \
         type (BUBBLE, THOUGHT, SFX, NARRATION, OTHER), tone (CASUAL, FORMAL, ANGRY, SCARED) \
         and an optional notes field. Order bubbles top-down, right-to-left.",
    );
    prompt
}
