//! Stateless objective sub-generator for kill, fetch, and explore
//! objectives.
//!
//! Target and location pools are fixed template pools. This is the seam
//! where a world-aware implementation would query live game state for
//! actual spawn tables and discovered locations instead.

use rand::Rng;

use crate::error::Result;
use crate::pcg::quests::{ObjectiveType, QuestObjective};
use crate::pcg::seed::GenerationContext;

const ENEMY_POOL: &[&str] = &[
    "dire wolves",
    "marsh trolls",
    "bone raiders",
    "cave spiders",
    "renegade soldiers",
    "grave wights",
];

const ITEM_POOL: &[&str] = &[
    "lost supply crates",
    "stolen heirlooms",
    "rare herbs",
    "ancient tablets",
    "smuggled contraband",
];

const LOCATION_POOL: &[&str] = &[
    "the Sunken Crypt",
    "Blackbriar Forest",
    "the Old Watchtower",
    "the Salt Mines",
    "Raven's Pass",
    "the Drowned Chapel",
];

/// Produces standalone objectives for the quests generator and for any
/// collaborator that needs a single objective on demand.
pub struct ObjectiveGenerator;

impl ObjectiveGenerator {
    /// Kill objective; difficulty is clamped to [1, 10] and drives the
    /// target count.
    pub fn kill(ctx: &mut GenerationContext, difficulty: u8) -> Result<QuestObjective> {
        ctx.check_cancelled()?;
        let difficulty = difficulty.clamp(1, 10);
        let id = ctx.next_id("obj");
        let rng = ctx.rng();
        let target = ENEMY_POOL[rng.random_range(0..ENEMY_POOL.len())].to_string();
        let quantity = u32::from(difficulty) * rng.random_range(1..=3);
        Ok(QuestObjective::new(
            id,
            ObjectiveType::Kill,
            format!("Slay {quantity} {target}"),
            target,
            quantity,
        ))
    }

    /// Fetch objective; the player level is clamped to [1, 20] and scales
    /// the haul.
    pub fn fetch(ctx: &mut GenerationContext, player_level: u8) -> Result<QuestObjective> {
        ctx.check_cancelled()?;
        let player_level = player_level.clamp(1, 20);
        let id = ctx.next_id("obj");
        let rng = ctx.rng();
        let target = ITEM_POOL[rng.random_range(0..ITEM_POOL.len())].to_string();
        let quantity = 1 + u32::from(player_level) / 5 + rng.random_range(0..=2);
        Ok(QuestObjective::new(
            id,
            ObjectiveType::Fetch,
            format!("Recover {quantity} {target}"),
            target,
            quantity,
        ))
    }

    /// Explore objective; always valid.
    pub fn explore(ctx: &mut GenerationContext) -> Result<QuestObjective> {
        ctx.check_cancelled()?;
        let id = ctx.next_id("obj");
        let rng = ctx.rng();
        let target = LOCATION_POOL[rng.random_range(0..LOCATION_POOL.len())].to_string();
        Ok(QuestObjective::new(
            id,
            ObjectiveType::Explore,
            format!("Explore {target}"),
            target,
            1,
        ))
    }

    pub fn enemy_pool() -> &'static [&'static str] {
        ENEMY_POOL
    }

    pub fn location_pool() -> &'static [&'static str] {
        LOCATION_POOL
    }
}
