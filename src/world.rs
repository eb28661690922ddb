//! World collaborator: the indexed result of a bootstrap.
//!
//! The PCG core fills a `World` during bootstrap and hands it back; it
//! keeps no mutable ownership afterward. Generators may receive a shared
//! reference through `GenerationParams` to consult already-generated
//! content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pcg::characters::Character;
use crate::pcg::dialogue::DialogueTree;
use crate::pcg::factions::Faction;
use crate::pcg::items::Item;
use crate::pcg::quests::Quest;
use crate::pcg::spells::Spell;
use crate::pcg::terrain::TerrainMap;
use crate::pcg::GeneratedContent;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    pub seed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<TerrainMap>,
    #[serde(default)]
    pub factions: Vec<Faction>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub quests: Vec<Quest>,
    #[serde(default)]
    pub dialogues: Vec<DialogueTree>,
    #[serde(default)]
    pub spells: Vec<Spell>,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Per-category counts, for logs and the CLI summary line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSummary {
    pub seed: i64,
    pub counts: BTreeMap<String, usize>,
}

impl World {
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// File a generated artifact under the matching index.
    pub fn absorb(&mut self, content: GeneratedContent) {
        match content {
            GeneratedContent::Item(item) => self.items.push(item),
            GeneratedContent::Items(mut items) => self.items.append(&mut items),
            GeneratedContent::Quest(quest) => self.quests.push(quest),
            GeneratedContent::QuestChain(mut chain) => self.quests.append(&mut chain),
            GeneratedContent::Terrain(map) => self.terrain = Some(map),
            GeneratedContent::Characters(mut cs) => self.characters.append(&mut cs),
            GeneratedContent::Dialogue(mut ds) => self.dialogues.append(&mut ds),
            GeneratedContent::Spells(mut ss) => self.spells.append(&mut ss),
            GeneratedContent::Factions(mut fs) => self.factions.append(&mut fs),
        }
    }

    pub fn summary(&self) -> WorldSummary {
        let mut counts = BTreeMap::new();
        counts.insert("factions".to_string(), self.factions.len());
        counts.insert(
            "terrain_tiles".to_string(),
            self.terrain.as_ref().map_or(0, |t| t.tiles.len()),
        );
        counts.insert("characters".to_string(), self.characters.len());
        counts.insert("quests".to_string(), self.quests.len());
        counts.insert("dialogues".to_string(), self.dialogues.len());
        counts.insert("spells".to_string(), self.spells.len());
        counts.insert("items".to_string(), self.items.len());
        WorldSummary {
            seed: self.seed,
            counts,
        }
    }
}
