//! Character (NPC) generator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

const MAX_COUNT: u64 = 200;
const DEFAULT_COUNT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Merchant,
    Guard,
    Scholar,
    Wanderer,
    Noble,
    Smith,
}

impl CharacterRole {
    fn all() -> [CharacterRole; 6] {
        [
            CharacterRole::Merchant,
            CharacterRole::Guard,
            CharacterRole::Scholar,
            CharacterRole::Wanderer,
            CharacterRole::Noble,
            CharacterRole::Smith,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub role: CharacterRole,
    pub level: u8,
    pub stats: BTreeMap<String, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
}

const GIVEN_NAMES: &[&str] = &[
    "Aldric", "Berta", "Caldus", "Doria", "Edmund", "Ferra", "Gorm", "Hesk", "Isolde", "Joren",
    "Kessa", "Lyra", "Maren", "Nils", "Oswin", "Petra", "Quill", "Rowena", "Soren", "Tam",
];

const EPITHETS: &[&str] = &[
    "the Grey", "of the Ford", "Ironhand", "the Quiet", "Threefingers", "the Younger",
    "of Harrow Fen", "the Lantern", "Stormborn", "the Patient",
];

const STAT_NAMES: [&str; 4] = ["might", "agility", "wits", "resolve"];

pub struct CharacterGenerator;

impl CharacterGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CharacterGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for CharacterGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Characters
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        if let Some(count) = params.constraint_u64("count") {
            if count == 0 || count > MAX_COUNT {
                return Err(EngineError::Validation(format!(
                    "character count {count} outside [1, {MAX_COUNT}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let params = ctx.params().clone();
        let count = params.constraint_u64("count").unwrap_or(DEFAULT_COUNT);
        // Faction pool: explicit constraint first, then the world being
        // assembled, else no affiliations
        let faction_pool: Vec<String> = params
            .constraints
            .get("faction_ids")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .or_else(|| {
                params
                    .world
                    .as_ref()
                    .map(|w| w.factions.iter().map(|f| f.id.clone()).collect())
            })
            .unwrap_or_default();

        let mut characters = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ctx.check_cancelled()?;
            let id = ctx.next_id("npc");
            let rng = ctx.rng();

            let given = GIVEN_NAMES[rng.random_range(0..GIVEN_NAMES.len())];
            let name = if rng.random_bool(0.4) {
                format!("{given} {}", EPITHETS[rng.random_range(0..EPITHETS.len())])
            } else {
                given.to_string()
            };
            let roles = CharacterRole::all();
            let role = roles[rng.random_range(0..roles.len())];
            let level = i16::from(params.player_level)
                .saturating_add(rng.random_range(-2..=2))
                .clamp(1, 20) as u8;

            let mut stats = BTreeMap::new();
            for stat in STAT_NAMES {
                stats.insert(stat.to_string(), rng.random_range(3..=10) + i32::from(level) / 4);
            }

            let faction = if faction_pool.is_empty() || rng.random_bool(0.25) {
                None
            } else {
                Some(faction_pool[rng.random_range(0..faction_pool.len())].clone())
            };

            characters.push(Character {
                id,
                name,
                role,
                level,
                stats,
                faction,
            });
            tokio::task::yield_now().await;
        }

        Ok(GeneratedContent::Characters(characters))
    }
}
