//! Quests generator: objective tables keyed by quest type, a narrative
//! engine for dressing, reward rolls, and seeded quest chains.

pub mod narrative;
pub mod objectives;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator, RarityTier};

pub use narrative::{Narrative, NarrativeEngine, DEFAULT_THEME};
pub use objectives::ObjectiveGenerator;

pub const MAX_CHAIN_LENGTH: u64 = 20;
const MAX_OBJECTIVES: u64 = 10;
const OPTIONAL_OBJECTIVE_CHANCE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    Kill,
    Fetch,
    Explore,
    Escort,
}

/// Quest archetype; keys the objective-template tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    Hunt,
    Retrieval,
    Exploration,
    Rescue,
}

impl QuestType {
    pub fn all() -> [QuestType; 4] {
        [
            QuestType::Hunt,
            QuestType::Retrieval,
            QuestType::Exploration,
            QuestType::Rescue,
        ]
    }

    pub fn parse(s: &str) -> Result<QuestType> {
        match s {
            "hunt" => Ok(QuestType::Hunt),
            "retrieval" => Ok(QuestType::Retrieval),
            "exploration" => Ok(QuestType::Exploration),
            "rescue" => Ok(QuestType::Rescue),
            other => Err(EngineError::Validation(format!(
                "unknown quest type '{other}'"
            ))),
        }
    }

    /// Short description of what this archetype asks of the player; used
    /// by the narrative engine.
    pub fn charge(&self) -> &'static str {
        match self {
            QuestType::Hunt => "a threat must be put down before it spreads.",
            QuestType::Retrieval => "something precious has been lost and must be recovered.",
            QuestType::Exploration => "uncharted ground must be walked and mapped.",
            QuestType::Rescue => "someone is in peril and time is short.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    NotStarted,
    Active,
    Completed,
    Failed,
}

/// One step of a quest. Mutated only by the game-loop collaborator through
/// [`QuestObjective::advance`], which maintains the progress invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestObjective {
    pub id: String,
    pub objective_type: ObjectiveType,
    pub description: String,
    pub target: String,
    pub quantity: u32,
    pub progress: u32,
    pub complete: bool,
    pub optional: bool,
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
}

impl QuestObjective {
    pub fn new(
        id: String,
        objective_type: ObjectiveType,
        description: String,
        target: String,
        quantity: u32,
    ) -> Self {
        Self {
            id,
            objective_type,
            description,
            target,
            quantity: quantity.max(1),
            progress: 0,
            complete: false,
            optional: false,
            conditions: BTreeMap::new(),
        }
    }

    /// Advance progress, clamped to the quantity; completion tracks
    /// progress exactly.
    pub fn advance(&mut self, amount: u32) -> u32 {
        self.progress = self.progress.saturating_add(amount).min(self.quantity);
        self.complete = self.progress == self.quantity;
        self.progress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Experience,
    Gold,
    Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestReward {
    pub reward_type: RewardType,
    pub amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub quest_type: QuestType,
    pub status: QuestStatus,
    pub quest_giver: String,
    pub start_dialogue: String,
    pub end_dialogue: String,
    pub objectives: Vec<QuestObjective>,
    pub rewards: Vec<QuestReward>,
}

impl Quest {
    /// NotStarted -> Active; any other transition is invalid.
    pub fn activate(&mut self) -> Result<()> {
        if self.status != QuestStatus::NotStarted {
            return Err(EngineError::InvalidState(format!(
                "quest '{}' cannot activate from {:?}",
                self.id, self.status
            )));
        }
        self.status = QuestStatus::Active;
        Ok(())
    }

    /// Active -> Completed, once every required objective is complete.
    pub fn complete(&mut self) -> Result<()> {
        if self.status != QuestStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "quest '{}' cannot complete from {:?}",
                self.id, self.status
            )));
        }
        if self
            .objectives
            .iter()
            .any(|o| !o.optional && !o.complete)
        {
            return Err(EngineError::InvalidState(format!(
                "quest '{}' has unfinished required objectives",
                self.id
            )));
        }
        self.status = QuestStatus::Completed;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        if self.status != QuestStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "quest '{}' cannot fail from {:?}",
                self.id, self.status
            )));
        }
        self.status = QuestStatus::Failed;
        Ok(())
    }
}

struct ObjectiveTemplate {
    objective_type: ObjectiveType,
    verb: &'static str,
    targets: &'static [&'static str],
    min_quantity: u32,
    max_quantity: u32,
}

fn objective_tables() -> BTreeMap<QuestType, Vec<ObjectiveTemplate>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        QuestType::Hunt,
        vec![
            ObjectiveTemplate {
                objective_type: ObjectiveType::Kill,
                verb: "Slay",
                targets: &[
                    "dire wolves",
                    "marsh trolls",
                    "bone raiders",
                    "grave wights",
                ],
                min_quantity: 2,
                max_quantity: 8,
            },
            ObjectiveTemplate {
                objective_type: ObjectiveType::Kill,
                verb: "Drive off",
                targets: &["bandit scouts", "feral hounds", "carrion birds"],
                min_quantity: 3,
                max_quantity: 10,
            },
        ],
    );
    tables.insert(
        QuestType::Retrieval,
        vec![
            ObjectiveTemplate {
                objective_type: ObjectiveType::Fetch,
                verb: "Recover",
                targets: &["stolen heirlooms", "lost supply crates", "ancient tablets"],
                min_quantity: 1,
                max_quantity: 5,
            },
            ObjectiveTemplate {
                objective_type: ObjectiveType::Fetch,
                verb: "Gather",
                targets: &["rare herbs", "moonlit lilies", "iron ore samples"],
                min_quantity: 3,
                max_quantity: 9,
            },
        ],
    );
    tables.insert(
        QuestType::Exploration,
        vec![ObjectiveTemplate {
            objective_type: ObjectiveType::Explore,
            verb: "Explore",
            targets: &[
                "the Sunken Crypt",
                "Blackbriar Forest",
                "the Old Watchtower",
                "Raven's Pass",
            ],
            min_quantity: 1,
            max_quantity: 1,
        }],
    );
    tables.insert(
        QuestType::Rescue,
        vec![
            ObjectiveTemplate {
                objective_type: ObjectiveType::Escort,
                verb: "Escort",
                targets: &["the captive merchant", "the wounded scout", "the lost child"],
                min_quantity: 1,
                max_quantity: 1,
            },
            ObjectiveTemplate {
                objective_type: ObjectiveType::Kill,
                verb: "Cut down",
                targets: &["slaver guards", "kidnapper sentries"],
                min_quantity: 2,
                max_quantity: 6,
            },
        ],
    );
    tables
}

pub struct QuestsGenerator {
    narrative: NarrativeEngine,
    tables: BTreeMap<QuestType, Vec<ObjectiveTemplate>>,
}

impl QuestsGenerator {
    pub fn new() -> Self {
        Self {
            narrative: NarrativeEngine::with_defaults(),
            tables: objective_tables(),
        }
    }

    fn objective_bounds(&self, params: &GenerationParams) -> Result<(u64, u64)> {
        let min = params.constraint_u64("min_objectives").unwrap_or(1);
        let max = params.constraint_u64("max_objectives").unwrap_or(3);
        if min == 0 || max == 0 {
            return Err(EngineError::Validation(
                "objective counts must be >= 1".into(),
            ));
        }
        if min > max {
            return Err(EngineError::Validation(format!(
                "min_objectives {min} exceeds max_objectives {max}"
            )));
        }
        if max > MAX_OBJECTIVES {
            return Err(EngineError::Validation(format!(
                "max_objectives {max} exceeds cap {MAX_OBJECTIVES}"
            )));
        }
        Ok((min, max))
    }

    fn reward_rarity(params: &GenerationParams, difficulty: u8) -> Result<RarityTier> {
        if let Some(tier) = params.constraint_rarity("reward_tier")? {
            return Ok(tier);
        }
        Ok(match difficulty {
            0..=7 => RarityTier::Uncommon,
            8..=12 => RarityTier::Rare,
            13..=16 => RarityTier::Epic,
            _ => RarityTier::Legendary,
        })
    }

    fn generate_quest(&self, ctx: &mut GenerationContext) -> Result<Quest> {
        let params = ctx.params().clone();
        let difficulty = params.difficulty;
        let (min_objectives, max_objectives) = self.objective_bounds(&params)?;
        let theme = params
            .constraint_str("theme")
            .unwrap_or(DEFAULT_THEME)
            .to_string();

        let quest_type = match params.constraint_str("quest_type") {
            Some(s) => QuestType::parse(s)?,
            None => {
                let all = QuestType::all();
                all[ctx.rng().random_range(0..all.len())]
            }
        };

        let id = ctx.next_id("quest");
        let count = ctx
            .rng()
            .random_range(min_objectives..=max_objectives);

        let table = self
            .tables
            .get(&quest_type)
            .ok_or_else(|| EngineError::Internal(format!("no table for {quest_type:?}")))?;

        let mut quest_objectives = Vec::with_capacity(count as usize);
        for i in 0..count {
            ctx.check_cancelled()?;
            let obj_id = ctx.next_id("obj");
            let rng = ctx.rng();
            let template = &table[rng.random_range(0..table.len())];
            let base = rng.random_range(template.min_quantity..=template.max_quantity);
            let scaled = (f64::from(base) * f64::from(difficulty) / 10.0).round() as u32;
            let quantity = scaled.max(template.min_quantity);
            let target = template.targets[rng.random_range(0..template.targets.len())].to_string();
            let optional = i > 0 && rng.random_bool(OPTIONAL_OBJECTIVE_CHANCE);

            let description = if template.objective_type == ObjectiveType::Explore
                || quantity == 1
            {
                format!("{} {}", template.verb, target)
            } else {
                format!("{} {} {}", template.verb, quantity, target)
            };

            let mut objective = QuestObjective::new(
                obj_id,
                template.objective_type,
                description,
                target,
                quantity,
            );
            objective.optional = optional;
            quest_objectives.push(objective);
        }

        let narrative = self.narrative.narrate(ctx.rng(), &theme, quest_type);

        let mut rewards = Vec::with_capacity(3);
        {
            let rng = ctx.rng();
            rewards.push(QuestReward {
                reward_type: RewardType::Experience,
                amount: 100 * u32::from(difficulty) * rng.random_range(1..=3),
                item_id: None,
            });
            if rng.random_bool(0.80) {
                rewards.push(QuestReward {
                    reward_type: RewardType::Gold,
                    amount: 25 * u32::from(difficulty) * rng.random_range(1..=4),
                    item_id: None,
                });
            }
        }
        if difficulty >= 3 && ctx.rng().random_bool(0.60) {
            let rarity = Self::reward_rarity(&params, difficulty)?;
            let item_id = ctx.next_id(&format!("reward_{}", rarity.as_str()));
            rewards.push(QuestReward {
                reward_type: RewardType::Item,
                amount: 1,
                item_id: Some(item_id),
            });
        }

        Ok(Quest {
            id,
            title: narrative.title,
            description: narrative.description,
            quest_type,
            status: QuestStatus::NotStarted,
            quest_giver: narrative.quest_giver,
            start_dialogue: narrative.start_dialogue,
            end_dialogue: narrative.end_dialogue,
            objectives: quest_objectives,
            rewards,
        })
    }

    /// Generate a chain: each step reseeds from the chain RNG so the whole
    /// chain is a function of the request seed, while difficulty climbs by
    /// half a point per step.
    async fn generate_chain(
        &self,
        ctx: &mut GenerationContext,
        length: u64,
    ) -> Result<Vec<Quest>> {
        let base_params = ctx.params().clone();
        let mut chain = Vec::with_capacity(length as usize);

        for i in 0..length {
            ctx.check_cancelled()?;
            let step_seed = match ctx.rng().next_u64() as i64 {
                0 => 1,
                s => s,
            };
            let step_difficulty =
                (u64::from(base_params.difficulty) + i / 2).min(20) as u8;
            let mut step_params = base_params.clone();
            step_params.difficulty = step_difficulty;

            let mut step_ctx = GenerationContext::new(
                ctx.content_type(),
                ctx.component().to_string(),
                step_seed,
                step_params,
                ctx.cancel_token().clone(),
            );
            let mut quest = self.generate_quest(&mut step_ctx)?;
            if length > 1 {
                quest.title = format!("{} (Part {})", quest.title, i + 1);
            }
            chain.push(quest);
            tokio::task::yield_now().await;
        }
        Ok(chain)
    }
}

impl Default for QuestsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for QuestsGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Quests
    }

    fn version(&self) -> &'static str {
        "1.1.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        self.objective_bounds(params)?;
        if let Some(s) = params.constraint_str("quest_type") {
            QuestType::parse(s)?;
        }
        params.constraint_rarity("reward_tier")?;
        if let Some(length) = params.constraint_u64("chain_length") {
            if length == 0 || length > MAX_CHAIN_LENGTH {
                return Err(EngineError::Validation(format!(
                    "chain_length {length} outside [1, {MAX_CHAIN_LENGTH}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let length = ctx.params().constraint_u64("chain_length").unwrap_or(1);
        debug!(length, component = ctx.component(), "generating quests");

        if length == 1 {
            Ok(GeneratedContent::Quest(self.generate_quest(ctx)?))
        } else {
            Ok(GeneratedContent::QuestChain(
                self.generate_chain(ctx, length).await?,
            ))
        }
    }
}
