//! Faction generator: named powers with an ethos, standing toward the
//! players, and deterministic rivalries.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

const MAX_COUNT: u64 = 20;
const DEFAULT_COUNT: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionEthos {
    Honor,
    Coin,
    Knowledge,
    Shadow,
    Wild,
}

impl FactionEthos {
    fn all() -> [FactionEthos; 5] {
        [
            FactionEthos::Honor,
            FactionEthos::Coin,
            FactionEthos::Knowledge,
            FactionEthos::Shadow,
            FactionEthos::Wild,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: String,
    pub name: String,
    pub ethos: FactionEthos,
    /// Standing toward the party, -100..=100
    pub disposition: i32,
    /// Ids of rival factions within the same generated set
    #[serde(default)]
    pub rivals: Vec<String>,
}

const FACTION_ADJECTIVES: &[&str] = &[
    "Silver", "Broken", "Crimson", "Veiled", "Iron", "Wandering", "Last", "Gilded",
];

const FACTION_NOUNS: &[&str] = &[
    "Compact", "Banner", "Circle", "Wardens", "Syndicate", "Order", "Court", "Kindred",
];

pub struct FactionGenerator;

impl FactionGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FactionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for FactionGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Factions
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        if let Some(count) = params.constraint_u64("count") {
            if count == 0 || count > MAX_COUNT {
                return Err(EngineError::Validation(format!(
                    "faction count {count} outside [1, {MAX_COUNT}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let count = ctx.params().constraint_u64("count").unwrap_or(DEFAULT_COUNT);

        let mut factions = Vec::with_capacity(count as usize);
        let mut used_names = Vec::new();
        for _ in 0..count {
            ctx.check_cancelled()?;
            let id = ctx.next_id("faction");
            let rng = ctx.rng();

            // Re-roll on collision; the pool has 64 combinations and sets
            // cap at 20, so this terminates quickly
            let name = loop {
                let adjective =
                    FACTION_ADJECTIVES[rng.random_range(0..FACTION_ADJECTIVES.len())];
                let noun = FACTION_NOUNS[rng.random_range(0..FACTION_NOUNS.len())];
                let candidate = format!("The {adjective} {noun}");
                if !used_names.contains(&candidate) {
                    break candidate;
                }
            };
            used_names.push(name.clone());

            let ethos_pool = FactionEthos::all();
            let ethos = ethos_pool[rng.random_range(0..ethos_pool.len())];
            let disposition = rng.random_range(-60..=60);

            factions.push(Faction {
                id,
                name,
                ethos,
                disposition,
                rivals: Vec::new(),
            });
            tokio::task::yield_now().await;
        }

        // Rivalries after the roster is fixed: each faction draws one rival
        // other than itself
        if factions.len() > 1 {
            let ids: Vec<String> = factions.iter().map(|f| f.id.clone()).collect();
            for (i, faction) in factions.iter_mut().enumerate() {
                ctx.check_cancelled()?;
                let mut rival = ctx.rng().random_range(0..ids.len());
                if rival == i {
                    rival = (rival + 1) % ids.len();
                }
                faction.rivals.push(ids[rival].clone());
            }
        }

        Ok(GeneratedContent::Factions(factions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn context(seed: i64, params: GenerationParams) -> GenerationContext {
        GenerationContext::new(
            ContentType::Factions,
            "pcg.factions",
            seed,
            params,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn factions_are_deterministic_with_valid_rivalries() {
        let generator = FactionGenerator::new();
        let params = GenerationParams::new(8).with_constraint("count", 5u64);

        let a = generator
            .generate(&mut context(23, params.clone()))
            .await
            .unwrap();
        let b = generator.generate(&mut context(23, params)).await.unwrap();
        let factions = match (a, b) {
            (GeneratedContent::Factions(a), GeneratedContent::Factions(b)) => {
                assert_eq!(a, b);
                a
            }
            other => panic!("unexpected artifacts: {other:?}"),
        };

        assert_eq!(factions.len(), 5);
        let ids: Vec<_> = factions.iter().map(|f| f.id.clone()).collect();
        for faction in &factions {
            assert_eq!(faction.rivals.len(), 1);
            // Rival exists and is never the faction itself
            assert!(ids.contains(&faction.rivals[0]));
            assert_ne!(faction.rivals[0], faction.id);
            assert!((-100..=100).contains(&faction.disposition));
        }

        // Names are unique within a set
        let mut names: Vec<_> = factions.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[tokio::test]
    async fn a_single_faction_has_no_rivals() {
        let generator = FactionGenerator::new();
        let params = GenerationParams::new(8).with_constraint("count", 1u64);
        let factions = match generator.generate(&mut context(23, params)).await.unwrap() {
            GeneratedContent::Factions(fs) => fs,
            other => panic!("unexpected artifact: {other:?}"),
        };
        assert_eq!(factions.len(), 1);
        assert!(factions[0].rivals.is_empty());
    }
}
