//! # Procedural Content Generation
//!
//! The generation pipeline: a catalogue of pluggable generators keyed by
//! content type, coordinated by [`manager::PcgManager`], with all
//! randomness flowing from per-request seeded RNGs so that equal inputs
//! produce structurally equal artifacts.

pub mod characters;
pub mod dialogue;
pub mod factions;
pub mod items;
pub mod manager;
pub mod quests;
pub mod seed;
pub mod spells;
pub mod terrain;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::world::World;

pub use manager::PcgManager;
pub use seed::{GenerationContext, SeedManager};

/// Category of generated content. Closed set; labels double as component
/// labels for seed derivation and as artifact file stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Terrain,
    Items,
    Quests,
    Characters,
    Dialogue,
    Spells,
    Levels,
    Factions,
}

impl ContentType {
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Terrain => "terrain",
            ContentType::Items => "items",
            ContentType::Quests => "quests",
            ContentType::Characters => "characters",
            ContentType::Dialogue => "dialogue",
            ContentType::Spells => "spells",
            ContentType::Levels => "levels",
            ContentType::Factions => "factions",
        }
    }

    pub fn all() -> [ContentType; 8] {
        [
            ContentType::Terrain,
            ContentType::Items,
            ContentType::Quests,
            ContentType::Characters,
            ContentType::Dialogue,
            ContentType::Spells,
            ContentType::Levels,
            ContentType::Factions,
        ]
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered rarity tiers. Declaration order is the total order; higher
/// tiers carry non-decreasing stat and value multipliers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RarityTier {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Artifact,
}

impl RarityTier {
    pub fn all() -> [RarityTier; 6] {
        [
            RarityTier::Common,
            RarityTier::Uncommon,
            RarityTier::Rare,
            RarityTier::Epic,
            RarityTier::Legendary,
            RarityTier::Artifact,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RarityTier::Common => "common",
            RarityTier::Uncommon => "uncommon",
            RarityTier::Rare => "rare",
            RarityTier::Epic => "epic",
            RarityTier::Legendary => "legendary",
            RarityTier::Artifact => "artifact",
        }
    }

    /// Parse a tier name from request constraints; unknown tiers are
    /// invalid params. Template files reject unknown tiers at load through
    /// their own schema.
    pub fn parse(s: &str) -> Result<RarityTier> {
        match s {
            "common" => Ok(RarityTier::Common),
            "uncommon" => Ok(RarityTier::Uncommon),
            "rare" => Ok(RarityTier::Rare),
            "epic" => Ok(RarityTier::Epic),
            "legendary" => Ok(RarityTier::Legendary),
            "artifact" => Ok(RarityTier::Artifact),
            other => Err(EngineError::Validation(format!(
                "unknown rarity tier '{other}'"
            ))),
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(i: usize) -> RarityTier {
        let all = RarityTier::all();
        all[i.min(all.len() - 1)]
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MIN_PLAYER_LEVEL: u8 = 1;
pub const MAX_PLAYER_LEVEL: u8 = 20;
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 20;

/// Per-request generation parameters. Immutable once validated.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Request seed; zero is rejected because it defeats determinism
    pub seed: i64,
    pub player_level: u8,
    pub difficulty: u8,
    /// Free-form generator-specific knobs
    pub constraints: HashMap<String, serde_json::Value>,
    pub timeout: Duration,
    /// Read-only view of the world being assembled, when available
    pub world: Option<Arc<World>>,
}

impl GenerationParams {
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            player_level: 1,
            difficulty: 1,
            constraints: HashMap::new(),
            timeout: Duration::from_secs(10),
            world: None,
        }
    }

    pub fn with_player_level(mut self, level: u8) -> Self {
        self.player_level = level;
        self
    }

    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_world(mut self, world: Arc<World>) -> Self {
        self.world = Some(world);
        self
    }

    pub fn with_constraint(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.constraints.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.seed == 0 {
            return Err(EngineError::Validation(
                "seed must be non-zero for deterministic generation".into(),
            ));
        }
        if !(MIN_PLAYER_LEVEL..=MAX_PLAYER_LEVEL).contains(&self.player_level) {
            return Err(EngineError::Validation(format!(
                "player_level {} outside [{MIN_PLAYER_LEVEL}, {MAX_PLAYER_LEVEL}]",
                self.player_level
            )));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(EngineError::Validation(format!(
                "difficulty {} outside [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]",
                self.difficulty
            )));
        }
        Ok(())
    }

    pub fn constraint_str(&self, key: &str) -> Option<&str> {
        self.constraints.get(key).and_then(|v| v.as_str())
    }

    pub fn constraint_u64(&self, key: &str) -> Option<u64> {
        self.constraints.get(key).and_then(|v| v.as_u64())
    }

    pub fn constraint_f64(&self, key: &str) -> Option<f64> {
        self.constraints.get(key).and_then(|v| v.as_f64())
    }

    pub fn constraint_rarity(&self, key: &str) -> Result<Option<RarityTier>> {
        match self.constraint_str(key) {
            Some(s) => RarityTier::parse(s).map(Some),
            None => Ok(None),
        }
    }
}

/// A generator's output. Every variant carries enough identity for the
/// metrics subsystem and serializes to YAML for bootstrap artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum GeneratedContent {
    Item(items::Item),
    Items(Vec<items::Item>),
    Quest(quests::Quest),
    QuestChain(Vec<quests::Quest>),
    Terrain(terrain::TerrainMap),
    Characters(Vec<characters::Character>),
    Dialogue(Vec<dialogue::DialogueTree>),
    Spells(Vec<spells::Spell>),
    Factions(Vec<factions::Faction>),
}

impl GeneratedContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            GeneratedContent::Item(_) | GeneratedContent::Items(_) => ContentType::Items,
            GeneratedContent::Quest(_) | GeneratedContent::QuestChain(_) => ContentType::Quests,
            GeneratedContent::Terrain(_) => ContentType::Terrain,
            GeneratedContent::Characters(_) => ContentType::Characters,
            GeneratedContent::Dialogue(_) => ContentType::Dialogue,
            GeneratedContent::Spells(_) => ContentType::Spells,
            GeneratedContent::Factions(_) => ContentType::Factions,
        }
    }

    /// Identity recorded against metrics events.
    pub fn content_id(&self) -> String {
        match self {
            GeneratedContent::Item(item) => item.id.clone(),
            GeneratedContent::Items(items) => items
                .first()
                .map(|i| i.id.clone())
                .unwrap_or_else(|| "items:empty".into()),
            GeneratedContent::Quest(quest) => quest.id.clone(),
            GeneratedContent::QuestChain(chain) => chain
                .first()
                .map(|q| q.id.clone())
                .unwrap_or_else(|| "quests:empty".into()),
            GeneratedContent::Terrain(map) => map.id.clone(),
            GeneratedContent::Characters(cs) => cs
                .first()
                .map(|c| c.id.clone())
                .unwrap_or_else(|| "characters:empty".into()),
            GeneratedContent::Dialogue(ds) => ds
                .first()
                .map(|d| d.id.clone())
                .unwrap_or_else(|| "dialogue:empty".into()),
            GeneratedContent::Spells(ss) => ss
                .first()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| "spells:empty".into()),
            GeneratedContent::Factions(fs) => fs
                .first()
                .map(|f| f.id.clone())
                .unwrap_or_else(|| "factions:empty".into()),
        }
    }
}

/// Capability set every content generator implements.
///
/// Generators draw all randomness from the RNG owned by their
/// [`GenerationContext`] and never consult wall-clock time, so a fixed
/// (seed, component, params) triple reproduces the artifact exactly.
#[async_trait]
pub trait Generator: Send + Sync {
    fn content_type(&self) -> ContentType;

    fn version(&self) -> &'static str;

    /// Parameter validation; failures here are surfaced directly and never
    /// recorded as generation failures.
    fn validate(&self, params: &GenerationParams) -> Result<()>;

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent>;
}
