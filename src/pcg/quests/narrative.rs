//! Narrative engine: titles, descriptions, quest givers, and dialogue from
//! theme templates. All draws come from the caller's RNG so narrative is as
//! reproducible as the quest it decorates.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pcg::quests::QuestType;

/// Narrative dressing for one quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub title: String,
    pub description: String,
    pub quest_giver: String,
    pub start_dialogue: String,
    pub end_dialogue: String,
}

#[derive(Debug, Clone)]
struct ThemeTemplates {
    adjectives: Vec<&'static str>,
    nouns: Vec<&'static str>,
    givers: Vec<&'static str>,
    start_lines: Vec<&'static str>,
    end_lines: Vec<&'static str>,
}

pub const DEFAULT_THEME: &str = "classic_fantasy";

pub struct NarrativeEngine {
    themes: BTreeMap<&'static str, ThemeTemplates>,
}

impl NarrativeEngine {
    pub fn with_defaults() -> Self {
        let mut themes = BTreeMap::new();

        themes.insert(
            "classic_fantasy",
            ThemeTemplates {
                adjectives: vec!["Forgotten", "Ancient", "Gilded", "Whispering", "Shattered"],
                nouns: vec!["Crown", "Vale", "Covenant", "Beacon", "Oath"],
                givers: vec![
                    "Elder Maren",
                    "Captain Aldric",
                    "Seeress Lyra",
                    "Brother Caldus",
                ],
                start_lines: vec![
                    "The village has waited long for someone like you.",
                    "I would not ask were the need not dire.",
                    "The road ahead is dangerous, but the cause is just.",
                ],
                end_lines: vec![
                    "You have done us a great service.",
                    "The tale of this deed will outlive us both.",
                    "Take this, and our gratitude with it.",
                ],
            },
        );

        themes.insert(
            "grimdark",
            ThemeTemplates {
                adjectives: vec!["Rotting", "Hollow", "Blighted", "Silent", "Drowned"],
                nouns: vec!["Gallows", "Reliquary", "Plague", "Debt", "Vigil"],
                givers: vec!["Warden Hesk", "The Pale Broker", "Mother Vex", "Sergeant Crowe"],
                start_lines: vec![
                    "Nobody else would take the job. That should tell you something.",
                    "Payment on proof. Don't come back without it.",
                    "Keep your torch lit and your questions few.",
                ],
                end_lines: vec![
                    "So you lived. The coin is yours.",
                    "Don't expect thanks. Expect the next job.",
                    "It is done, then. Speak of it to no one.",
                ],
            },
        );

        themes.insert(
            "high_magic",
            ThemeTemplates {
                adjectives: vec!["Astral", "Prismatic", "Unbound", "Resonant", "Eternal"],
                nouns: vec!["Confluence", "Spire", "Sigil", "Paradox", "Aurora"],
                givers: vec![
                    "Archmage Solenne",
                    "The Chronicle Keeper",
                    "Magister Vell",
                    "The Weave itself",
                ],
                start_lines: vec![
                    "The leylines have shifted; you have been chosen by consequence.",
                    "What I ask defies three laws of thaumaturgy. Interested?",
                    "The Spire opens for few. It has opened for you.",
                ],
                end_lines: vec![
                    "The Weave remembers what you have done.",
                    "Balance is restored, for now.",
                    "Your name is written in light, adventurer.",
                ],
            },
        );

        themes.insert(
            "low_fantasy",
            ThemeTemplates {
                adjectives: vec!["Muddy", "Border", "Crooked", "Old", "Quiet"],
                nouns: vec!["Mill", "Crossing", "Harvest", "Ledger", "Fence"],
                givers: vec!["Reeve Oswin", "Innkeep Berta", "Old Tam", "The Miller's Widow"],
                start_lines: vec![
                    "It's not glorious work, but it pays in silver.",
                    "The magistrate won't help, so I'm asking you.",
                    "Simple job. Probably.",
                ],
                end_lines: vec![
                    "Good, honest work. Here's your due.",
                    "That's a weight off the whole village.",
                    "You'll drink free here for a season.",
                ],
            },
        );

        Self { themes }
    }

    pub fn theme_names(&self) -> Vec<&'static str> {
        self.themes.keys().copied().collect()
    }

    /// Compose a narrative. Unknown themes fall back to the default rather
    /// than failing; draw order is fixed.
    pub fn narrate(&self, rng: &mut StdRng, theme: &str, quest_type: QuestType) -> Narrative {
        let templates = self
            .themes
            .get(theme)
            .or_else(|| self.themes.get(DEFAULT_THEME))
            .expect("default theme is always present");

        let adjective = templates.adjectives[rng.random_range(0..templates.adjectives.len())];
        let noun = templates.nouns[rng.random_range(0..templates.nouns.len())];
        let quest_giver =
            templates.givers[rng.random_range(0..templates.givers.len())].to_string();
        let start_dialogue =
            templates.start_lines[rng.random_range(0..templates.start_lines.len())].to_string();
        let end_dialogue =
            templates.end_lines[rng.random_range(0..templates.end_lines.len())].to_string();

        let title = format!("The {adjective} {noun}");
        let description = format!(
            "{} has need of a capable hand: {}",
            quest_giver,
            quest_type.charge()
        );

        Narrative {
            title,
            description,
            quest_giver,
            start_dialogue,
            end_dialogue,
        }
    }
}

impl Default for NarrativeEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
