//! Items generator: templates, rarity scaling, enchantments, deterministic
//! naming and ids.

pub mod enchantment;
pub mod templates;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::pcg::seed::GenerationContext;
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator, RarityTier};

pub use enchantment::{Enchantment, EnchantmentKind, EnchantmentSystem, EnchantmentTemplate};
pub use templates::{default_weight, ItemTemplate, ItemTemplateRegistry, RarityModifier, StatRange};

/// Default outer probability that an item gets enchanted at all; the
/// rarity modifier's own chance gates each slot inside.
pub const DEFAULT_ENCHANTMENT_RATE: f64 = 0.35;

const MAX_BATCH: u64 = 500;

/// A generated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub base_type: String,
    pub rarity: RarityTier,
    pub material: Option<String>,
    pub stats: BTreeMap<String, i32>,
    pub properties: Vec<String>,
    pub enchantments: Vec<Enchantment>,
    pub value: u32,
    pub weight: f32,
}

pub struct ItemsGenerator {
    registry: ItemTemplateRegistry,
    enchantments: EnchantmentSystem,
    enchantment_rate: f64,
}

impl ItemsGenerator {
    pub fn new() -> Self {
        let registry = ItemTemplateRegistry::with_defaults();
        let enchantments = EnchantmentSystem::with_defaults();
        Self {
            registry,
            enchantments,
            enchantment_rate: DEFAULT_ENCHANTMENT_RATE,
        }
    }

    pub fn with_registry(registry: ItemTemplateRegistry) -> Result<Self> {
        registry.validate()?;
        let enchantments = EnchantmentSystem::with_defaults();
        enchantments.validate_against(&registry.type_names())?;
        Ok(Self {
            registry,
            enchantments,
            enchantment_rate: DEFAULT_ENCHANTMENT_RATE,
        })
    }

    /// Merge a YAML template document over the built-in defaults.
    pub fn merge_template_yaml(&mut self, doc: &str) -> Result<()> {
        self.registry.merge_yaml(doc)?;
        self.enchantments
            .validate_against(&self.registry.type_names())
    }

    pub fn registry(&self) -> &ItemTemplateRegistry {
        &self.registry
    }

    fn rarity_bounds(&self, params: &GenerationParams) -> Result<(RarityTier, RarityTier)> {
        let min = params
            .constraint_rarity("min_rarity")?
            .unwrap_or(RarityTier::Common);
        let max = params
            .constraint_rarity("max_rarity")?
            .unwrap_or(RarityTier::Legendary);
        if min > max {
            return Err(EngineError::Validation(format!(
                "min_rarity {min} exceeds max_rarity {max}"
            )));
        }
        Ok((min, max))
    }

    fn allowed_types(&self, params: &GenerationParams) -> Vec<String> {
        if let Some(listed) = params.constraints.get("item_types").and_then(|v| v.as_array()) {
            let known: Vec<String> = listed
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|t| self.registry.template(t).is_some())
                .map(str::to_string)
                .collect();
            if !known.is_empty() {
                return known;
            }
        }
        self.registry.type_names()
    }

    fn generate_one(&self, ctx: &mut GenerationContext) -> Result<Item> {
        let params = ctx.params().clone();
        let player_level = params.player_level;
        let (min_rarity, max_rarity) = self.rarity_bounds(&params)?;
        let allowed = self.allowed_types(&params);
        let rate = params
            .constraint_f64("enchantment_rate")
            .unwrap_or(self.enchantment_rate)
            .clamp(0.0, 1.0);

        let rng = ctx.rng();

        // Rarity, then type; the draw order is part of the determinism
        // contract.
        let rarity =
            RarityTier::from_index(rng.random_range(min_rarity.index()..=max_rarity.index()));
        let base_type = allowed[rng.random_range(0..allowed.len())].clone();

        let template = self
            .registry
            .template(&base_type)
            .ok_or_else(|| EngineError::Internal(format!("template '{base_type}' vanished")))?
            .clone();
        // A tier the template does not list degrades to its floor; item
        // generation never fails on rarity.
        let rarity = if template.rarities.contains(&rarity) {
            rarity
        } else {
            template.floor_rarity()
        };
        let modifier = self
            .registry
            .modifier(rarity)
            .cloned()
            .unwrap_or(RarityModifier {
                stat_multiplier: 1.0,
                enchantment_chance: 0.0,
                max_enchantments: 0,
                value_multiplier: 1.0,
                name_prefixes: vec![],
                name_suffixes: vec![],
            });

        let mut stats: BTreeMap<String, i32> = BTreeMap::new();
        for (stat, range) in &template.stat_ranges {
            let base = rng.random_range(range.min..=range.max);
            let scaled =
                (f64::from(base) * (1.0 + range.scaling * f64::from(player_level))).round() as i32;
            stats.insert(stat.clone(), scaled);
        }
        for value in stats.values_mut() {
            *value = (f64::from(*value) * modifier.stat_multiplier).round() as i32;
        }

        let weight = match stats.remove("weight") {
            Some(rolled) => rolled.max(0) as f32,
            None => default_weight(&base_type),
        };

        let material = if template.materials.is_empty() {
            None
        } else {
            Some(template.materials[rng.random_range(0..template.materials.len())].clone())
        };
        let base_part = template.name_parts[rng.random_range(0..template.name_parts.len())].clone();
        let prefix = if !modifier.name_prefixes.is_empty() && rng.random_bool(0.70) {
            Some(modifier.name_prefixes[rng.random_range(0..modifier.name_prefixes.len())].clone())
        } else {
            None
        };
        let suffix = if !modifier.name_suffixes.is_empty() && rng.random_bool(0.50) {
            Some(modifier.name_suffixes[rng.random_range(0..modifier.name_suffixes.len())].clone())
        } else {
            None
        };

        let mut name_parts: Vec<&str> = Vec::with_capacity(4);
        if let Some(p) = prefix.as_deref() {
            name_parts.push(p);
        }
        let material_title = material.as_deref().map(title_case);
        if let Some(m) = material_title.as_deref() {
            name_parts.push(m);
        }
        name_parts.push(&base_part);
        if let Some(s) = suffix.as_deref() {
            name_parts.push(s);
        }
        let name = name_parts.join(" ");

        let stat_total: f64 = stats.values().map(|v| f64::from(v.abs())).sum();
        let value = ((stat_total * 10.0 + f64::from(weight))
            * modifier.value_multiplier)
            .round()
            .max(1.0) as u32;

        let mut item = Item {
            id: ctx.next_id("item"),
            name,
            base_type,
            rarity,
            material,
            stats,
            properties: template.properties.clone(),
            enchantments: Vec::new(),
            value,
            weight,
        };

        if rate > 0.0 && ctx.rng().random_bool(rate) {
            self.enchantments
                .apply(ctx.rng(), &mut item, &modifier, player_level);
        }

        Ok(item)
    }
}

impl Default for ItemsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ItemsGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Items
    }

    fn version(&self) -> &'static str {
        "1.2.0"
    }

    fn validate(&self, params: &GenerationParams) -> Result<()> {
        params.validate()?;
        self.rarity_bounds(params)?;
        if let Some(count) = params.constraint_u64("count") {
            if count == 0 || count > MAX_BATCH {
                return Err(EngineError::Validation(format!(
                    "item count {count} outside [1, {MAX_BATCH}]"
                )));
            }
        }
        Ok(())
    }

    async fn generate(&self, ctx: &mut GenerationContext) -> Result<GeneratedContent> {
        let count = ctx.params().constraint_u64("count").unwrap_or(1);
        debug!(count, component = ctx.component(), "generating items");

        if count == 1 {
            return Ok(GeneratedContent::Item(self.generate_one(ctx)?));
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ctx.check_cancelled()?;
            items.push(self.generate_one(ctx)?);
            tokio::task::yield_now().await;
        }
        Ok(GeneratedContent::Items(items))
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn context(seed: i64, params: GenerationParams) -> GenerationContext {
        GenerationContext::new(
            ContentType::Items,
            "pcg.items",
            seed,
            params,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn identical_contexts_produce_identical_items() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(12345)
            .with_player_level(5)
            .with_difficulty(3);

        let a = match generator
            .generate(&mut context(42, params.clone()))
            .await
            .unwrap()
        {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };
        let b = match generator.generate(&mut context(42, params)).await.unwrap() {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_seeds_diverge() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(12345).with_player_level(5);

        let a = generator
            .generate(&mut context(1, params.clone()))
            .await
            .unwrap();
        let b = generator.generate(&mut context(2, params)).await.unwrap();
        assert_ne!(a.content_id(), b.content_id());
    }

    #[tokio::test]
    async fn rarity_outside_template_falls_back_to_floor() {
        let generator = ItemsGenerator::new();
        // Consumables list common..rare only; force the legendary band
        let params = GenerationParams::new(9)
            .with_constraint("item_types", serde_json::json!(["consumable"]))
            .with_constraint("min_rarity", "legendary")
            .with_constraint("max_rarity", "legendary");

        let item = match generator.generate(&mut context(7, params)).await.unwrap() {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };
        assert_eq!(item.rarity, RarityTier::Common);
    }

    #[tokio::test]
    async fn batch_generation_respects_count() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(9).with_constraint("count", 12u64);

        match generator.generate(&mut context(7, params)).await.unwrap() {
            GeneratedContent::Items(items) => {
                assert_eq!(items.len(), 12);
                // Ids drawn from the request RNG never collide in a batch
                let mut ids: Vec<_> = items.iter().map(|i| i.id.clone()).collect();
                ids.sort();
                ids.dedup();
                assert_eq!(ids.len(), 12);
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[tokio::test]
    async fn boundary_levels_and_difficulties_generate() {
        let generator = ItemsGenerator::new();
        for (level, difficulty) in [(1u8, 1u8), (1, 20), (20, 1), (20, 20)] {
            let params = GenerationParams::new(5)
                .with_player_level(level)
                .with_difficulty(difficulty);
            let result = generator.generate(&mut context(3, params)).await;
            assert!(result.is_ok(), "level {level} difficulty {difficulty}");
        }
    }

    #[tokio::test]
    async fn stats_scale_with_player_level() {
        let generator = ItemsGenerator::new();
        let base = GenerationParams::new(11)
            .with_constraint("item_types", serde_json::json!(["weapon"]))
            .with_constraint("max_rarity", "common")
            .with_constraint("enchantment_rate", 0.0);

        let low = match generator
            .generate(&mut context(7, base.clone().with_player_level(1)))
            .await
            .unwrap()
        {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };
        let high = match generator
            .generate(&mut context(7, base.with_player_level(20)))
            .await
            .unwrap()
        {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };

        // Same seed, same rolls; only the level scaling differs
        assert!(high.stats["damage"] > low.stats["damage"]);
    }

    #[test]
    fn invalid_rarity_window_is_a_validation_error() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(9)
            .with_constraint("min_rarity", "epic")
            .with_constraint("max_rarity", "uncommon");
        assert!(matches!(
            generator.validate(&params),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn zero_count_is_rejected() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(9).with_constraint("count", 0u64);
        assert!(generator.validate(&params).is_err());
    }

    #[tokio::test]
    async fn weight_defaults_by_type_when_not_rolled() {
        let generator = ItemsGenerator::new();
        let params = GenerationParams::new(9)
            .with_constraint("item_types", serde_json::json!(["accessory"]));
        let item = match generator.generate(&mut context(7, params)).await.unwrap() {
            GeneratedContent::Item(item) => item,
            other => panic!("unexpected artifact: {other:?}"),
        };
        assert_eq!(item.weight, default_weight("accessory"));
        assert!(item.value >= 1);
    }
}
