//! Dialogue generator: small branching trees assembled from line pools.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

const MAX_COUNT: u64 = 100;
const DEFAULT_COUNT: u64 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueResponse {
    pub text: String,
    /// Index of the node this response leads to; None ends the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub index: u32,
    pub text: String,
    pub responses: Vec<DialogueResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTree {
    pub id: String,
    pub speaker_role: String,
    pub nodes: Vec<DialogueNode>,
}

const GREETINGS: &[&str] = &[
    "Well met, traveler.",
    "You look like you've seen the road.",
    "We don't get many strangers here.",
    "Keep your blade sheathed and we'll get along.",
];

const RUMORS: &[&str] = &[
    "They say the old watchtower lights up on moonless nights.",
    "Merchants won't take the fen road anymore. Wolves, they claim.",
    "The reeve pays silver for news of the missing caravan.",
    "Something has been digging under the chapel. Something large.",
];

const FAREWELLS: &[&str] = &[
    "Safe roads to you.",
    "Don't die somewhere inconvenient.",
    "May your torch stay lit.",
    "Come back with coin or stories. Preferably both.",
];

const SPEAKER_ROLES: &[&str] = &["innkeeper", "guard", "merchant", "elder", "stranger"];

pub struct DialogueGenerator;

impl DialogueGenerator {
    pub fn new() -> Self {
        Self
    }

    fn build_tree(ctx: &mut GenerationContext) -> Result<DialogueTree> {
        ctx.check_cancelled()?;
        let id = ctx.next_id("dialogue");
        let rng = ctx.rng();

        let speaker_role = SPEAKER_ROLES[rng.random_range(0..SPEAKER_ROLES.len())].to_string();
        let rumor_count = rng.random_range(1..=2u32);

        let mut nodes = Vec::new();
        let greeting = GREETINGS[rng.random_range(0..GREETINGS.len())].to_string();
        let farewell_index = 1 + rumor_count;

        let mut greeting_responses = Vec::new();
        for i in 0..rumor_count {
            greeting_responses.push(DialogueResponse {
                text: "What news?".into(),
                next: Some(1 + i),
            });
        }
        greeting_responses.push(DialogueResponse {
            text: "Just passing through.".into(),
            next: Some(farewell_index),
        });
        nodes.push(DialogueNode {
            index: 0,
            text: greeting,
            responses: greeting_responses,
        });

        for i in 0..rumor_count {
            let rumor = RUMORS[rng.random_range(0..RUMORS.len())].to_string();
            nodes.push(DialogueNode {
                index: 1 + i,
                text: rumor,
                responses: vec![DialogueResponse {
                    text: "I'll keep that in mind.".into(),
                    next: Some(farewell_index),
                }],
            });
        }

        nodes.push(DialogueNode {
            index: farewell_index,
            text: FAREWELLS[rng.random_range(0..FAREWELLS.len())].to_string(),
            responses: vec![],
        });

        Ok(DialogueTree {
            id,
            speaker_role,
            nodes,
        })
    }
}

impl Default for DialogueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for DialogueGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Dialogue
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        if let Some(count) = params.constraint_u64("count") {
            if count == 0 || count > MAX_COUNT {
                return Err(EngineError::Validation(format!(
                    "dialogue count {count} outside [1, {MAX_COUNT}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let count = ctx.params().constraint_u64("count").unwrap_or(DEFAULT_COUNT);
        let mut trees = Vec::with_capacity(count as usize);
        for _ in 0..count {
            trees.push(Self::build_tree(ctx)?);
            tokio::task::yield_now().await;
        }
        Ok(GeneratedContent::Dialogue(trees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn context(seed: i64, params: GenerationParams) -> GenerationContext {
        GenerationContext::new(
            ContentType::Dialogue,
            "pcg.dialogue",
            seed,
            params,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn trees_are_deterministic_and_well_linked() {
        let generator = DialogueGenerator::new();
        let params = GenerationParams::new(2).with_constraint("count", 5u64);

        let a = generator
            .generate(&mut context(61, params.clone()))
            .await
            .unwrap();
        let b = generator.generate(&mut context(61, params)).await.unwrap();
        let trees = match (a, b) {
            (GeneratedContent::Dialogue(a), GeneratedContent::Dialogue(b)) => {
                assert_eq!(a, b);
                a
            }
            other => panic!("unexpected artifacts: {other:?}"),
        };

        assert_eq!(trees.len(), 5);
        for tree in &trees {
            // Every response points at an existing node
            for node in &tree.nodes {
                for response in &node.responses {
                    if let Some(next) = response.next {
                        assert!(tree.nodes.iter().any(|n| n.index == next));
                    }
                }
            }
            // The last node terminates the exchange
            assert!(tree.nodes.last().unwrap().responses.is_empty());
        }
    }

    #[test]
    fn count_bounds_are_validated() {
        let generator = DialogueGenerator::new();
        assert!(generator
            .validate(&GenerationParams::new(1).with_constraint("count", 0u64))
            .is_err());
        assert!(generator
            .validate(&GenerationParams::new(1).with_constraint("count", 101u64))
            .is_err());
        assert!(generator.validate(&GenerationParams::new(1)).is_ok());
    }
}
