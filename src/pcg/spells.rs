//! Spell generator.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

const MAX_COUNT: u64 = 200;
const DEFAULT_COUNT: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellSchool {
    Evocation,
    Abjuration,
    Illusion,
    Necromancy,
    Restoration,
    Conjuration,
}

impl SpellSchool {
    fn all() -> [SpellSchool; 6] {
        [
            SpellSchool::Evocation,
            SpellSchool::Abjuration,
            SpellSchool::Illusion,
            SpellSchool::Necromancy,
            SpellSchool::Restoration,
            SpellSchool::Conjuration,
        ]
    }

    fn noun_pool(&self) -> &'static [&'static str] {
        match self {
            SpellSchool::Evocation => &["Bolt", "Nova", "Lance", "Storm"],
            SpellSchool::Abjuration => &["Ward", "Aegis", "Bulwark", "Seal"],
            SpellSchool::Illusion => &["Veil", "Mirage", "Echo", "Mask"],
            SpellSchool::Necromancy => &["Pall", "Shroud", "Hunger", "Knell"],
            SpellSchool::Restoration => &["Mending", "Balm", "Renewal", "Grace"],
            SpellSchool::Conjuration => &["Calling", "Gate", "Binding", "Summons"],
        }
    }
}

const SPELL_PREFIXES: &[&str] = &[
    "Ashen", "Glacial", "Radiant", "Umbral", "Keening", "Verdant", "Gilded", "Hollow",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub id: String,
    pub name: String,
    pub school: SpellSchool,
    /// Spell circle, 1..=9
    pub level: u8,
    pub mana_cost: u32,
    pub power: u32,
    pub description: String,
}

pub struct SpellGenerator;

impl SpellGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Highest circle reachable at a given difficulty.
    fn max_circle(difficulty: u8) -> u8 {
        (1 + difficulty / 3).min(9)
    }
}

impl Default for SpellGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for SpellGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Spells
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        if let Some(count) = params.constraint_u64("count") {
            if count == 0 || count > MAX_COUNT {
                return Err(EngineError::Validation(format!(
                    "spell count {count} outside [1, {MAX_COUNT}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let params = ctx.params().clone();
        let count = params.constraint_u64("count").unwrap_or(DEFAULT_COUNT);
        let max_circle = Self::max_circle(params.difficulty);

        let mut spells = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ctx.check_cancelled()?;
            let id = ctx.next_id("spell");
            let rng = ctx.rng();

            let schools = SpellSchool::all();
            let school = schools[rng.random_range(0..schools.len())];
            let level = rng.random_range(1..=max_circle);
            let prefix = SPELL_PREFIXES[rng.random_range(0..SPELL_PREFIXES.len())];
            let nouns = school.noun_pool();
            let noun = nouns[rng.random_range(0..nouns.len())];

            let power = u32::from(level) * rng.random_range(4..=9);
            let mana_cost = u32::from(level) * 3 + rng.random_range(0..=4);

            spells.push(Spell {
                id,
                name: format!("{prefix} {noun}"),
                school,
                level,
                mana_cost,
                power,
                description: format!(
                    "A circle-{level} {} working.",
                    match school {
                        SpellSchool::Evocation => "evocation",
                        SpellSchool::Abjuration => "abjuration",
                        SpellSchool::Illusion => "illusion",
                        SpellSchool::Necromancy => "necromancy",
                        SpellSchool::Restoration => "restoration",
                        SpellSchool::Conjuration => "conjuration",
                    }
                ),
            });
            tokio::task::yield_now().await;
        }

        Ok(GeneratedContent::Spells(spells))
    }
}
