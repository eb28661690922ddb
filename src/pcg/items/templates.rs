//! Item templates and rarity modifiers.
//!
//! Templates load once at generator construction; a YAML document keyed
//! under `templates:` and `rarity_modifiers:` merges over the built-in
//! defaults by key. Everything here is read-only after load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::RarityTier;

/// Inclusive roll range for one stat, with per-player-level scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRange {
    pub min: i32,
    pub max: i32,
    #[serde(default)]
    pub scaling: f64,
}

/// Blueprint for one base item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub base_type: String,
    pub name_parts: Vec<String>,
    #[serde(default)]
    pub stat_ranges: BTreeMap<String, StatRange>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    pub rarities: Vec<RarityTier>,
}

impl ItemTemplate {
    /// Lowest tier the template lists; the fallback when a requested
    /// rarity is not available for this type.
    pub fn floor_rarity(&self) -> RarityTier {
        self.rarities
            .iter()
            .copied()
            .min()
            .unwrap_or(RarityTier::Common)
    }
}

/// Scaling applied on top of a template for one rarity tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityModifier {
    pub stat_multiplier: f64,
    pub enchantment_chance: f64,
    pub max_enchantments: u32,
    pub value_multiplier: f64,
    #[serde(default)]
    pub name_prefixes: Vec<String>,
    #[serde(default)]
    pub name_suffixes: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TemplatesDoc {
    #[serde(default)]
    templates: BTreeMap<String, ItemTemplate>,
    #[serde(default)]
    rarity_modifiers: BTreeMap<RarityTier, RarityModifier>,
}

/// Registry of item templates and rarity modifiers, keyed by base type and
/// tier respectively.
#[derive(Debug, Clone)]
pub struct ItemTemplateRegistry {
    templates: BTreeMap<String, ItemTemplate>,
    rarity_modifiers: BTreeMap<RarityTier, RarityModifier>,
}

impl ItemTemplateRegistry {
    /// Built-in defaults covering the four stock base types.
    pub fn with_defaults() -> Self {
        let mut templates = BTreeMap::new();

        templates.insert(
            "weapon".to_string(),
            ItemTemplate {
                base_type: "weapon".into(),
                name_parts: vec![
                    "Sword".into(),
                    "Axe".into(),
                    "Mace".into(),
                    "Dagger".into(),
                    "Spear".into(),
                    "Bow".into(),
                ],
                stat_ranges: BTreeMap::from([
                    (
                        "damage".to_string(),
                        StatRange {
                            min: 2,
                            max: 8,
                            scaling: 0.35,
                        },
                    ),
                    (
                        "speed".to_string(),
                        StatRange {
                            min: 1,
                            max: 4,
                            scaling: 0.05,
                        },
                    ),
                ]),
                properties: vec!["melee".into()],
                materials: vec![
                    "iron".into(),
                    "steel".into(),
                    "silver".into(),
                    "obsidian".into(),
                ],
                rarities: RarityTier::all().to_vec(),
            },
        );

        templates.insert(
            "armor".to_string(),
            ItemTemplate {
                base_type: "armor".into(),
                name_parts: vec![
                    "Cuirass".into(),
                    "Helm".into(),
                    "Shield".into(),
                    "Greaves".into(),
                    "Gauntlets".into(),
                ],
                stat_ranges: BTreeMap::from([
                    (
                        "defense".to_string(),
                        StatRange {
                            min: 1,
                            max: 6,
                            scaling: 0.40,
                        },
                    ),
                    (
                        "weight".to_string(),
                        StatRange {
                            min: 4,
                            max: 12,
                            scaling: 0.0,
                        },
                    ),
                ]),
                properties: vec!["wearable".into()],
                materials: vec![
                    "leather".into(),
                    "iron".into(),
                    "steel".into(),
                    "mithril".into(),
                ],
                rarities: vec![
                    RarityTier::Common,
                    RarityTier::Uncommon,
                    RarityTier::Rare,
                    RarityTier::Epic,
                    RarityTier::Legendary,
                ],
            },
        );

        templates.insert(
            "accessory".to_string(),
            ItemTemplate {
                base_type: "accessory".into(),
                name_parts: vec![
                    "Ring".into(),
                    "Amulet".into(),
                    "Charm".into(),
                    "Band".into(),
                ],
                stat_ranges: BTreeMap::from([(
                    "fortune".to_string(),
                    StatRange {
                        min: 1,
                        max: 3,
                        scaling: 0.20,
                    },
                )]),
                properties: vec!["wearable".into(), "trinket".into()],
                materials: vec!["silver".into(), "gold".into(), "jade".into()],
                rarities: vec![
                    RarityTier::Uncommon,
                    RarityTier::Rare,
                    RarityTier::Epic,
                    RarityTier::Legendary,
                    RarityTier::Artifact,
                ],
            },
        );

        templates.insert(
            "consumable".to_string(),
            ItemTemplate {
                base_type: "consumable".into(),
                name_parts: vec![
                    "Potion".into(),
                    "Elixir".into(),
                    "Draught".into(),
                    "Tonic".into(),
                ],
                stat_ranges: BTreeMap::from([(
                    "potency".to_string(),
                    StatRange {
                        min: 1,
                        max: 5,
                        scaling: 0.50,
                    },
                )]),
                properties: vec!["consumable".into()],
                materials: vec![],
                rarities: vec![RarityTier::Common, RarityTier::Uncommon, RarityTier::Rare],
            },
        );

        let rarity_modifiers = BTreeMap::from([
            (
                RarityTier::Common,
                RarityModifier {
                    stat_multiplier: 1.0,
                    enchantment_chance: 0.0,
                    max_enchantments: 0,
                    value_multiplier: 1.0,
                    name_prefixes: vec![],
                    name_suffixes: vec![],
                },
            ),
            (
                RarityTier::Uncommon,
                RarityModifier {
                    stat_multiplier: 1.1,
                    enchantment_chance: 0.05,
                    max_enchantments: 1,
                    value_multiplier: 1.25,
                    name_prefixes: vec!["Fine".into()],
                    name_suffixes: vec!["of Merit".into()],
                },
            ),
            (
                RarityTier::Rare,
                RarityModifier {
                    stat_multiplier: 1.25,
                    enchantment_chance: 0.15,
                    max_enchantments: 1,
                    value_multiplier: 1.75,
                    name_prefixes: vec!["Superior".into(), "Gleaming".into()],
                    name_suffixes: vec!["of the Hawk".into(), "of Vigor".into()],
                },
            ),
            (
                RarityTier::Epic,
                RarityModifier {
                    stat_multiplier: 1.5,
                    enchantment_chance: 0.30,
                    max_enchantments: 2,
                    value_multiplier: 2.5,
                    name_prefixes: vec!["Exalted".into(), "Radiant".into()],
                    name_suffixes: vec!["of the Colossus".into(), "of Storms".into()],
                },
            ),
            (
                RarityTier::Legendary,
                RarityModifier {
                    stat_multiplier: 2.0,
                    enchantment_chance: 0.50,
                    max_enchantments: 3,
                    value_multiplier: 4.0,
                    name_prefixes: vec!["Mythic".into(), "Sovereign".into()],
                    name_suffixes: vec!["of Legends".into(), "of the Ancients".into()],
                },
            ),
            (
                RarityTier::Artifact,
                RarityModifier {
                    stat_multiplier: 3.0,
                    enchantment_chance: 0.75,
                    max_enchantments: 4,
                    value_multiplier: 8.0,
                    name_prefixes: vec!["Primordial".into()],
                    name_suffixes: vec!["of the First Age".into()],
                },
            ),
        ]);

        let registry = Self {
            templates,
            rarity_modifiers,
        };
        debug_assert!(registry.validate().is_ok());
        registry
    }

    /// Merge a YAML document over the current contents; file entries
    /// override defaults by key.
    pub fn merge_yaml(&mut self, doc: &str) -> Result<()> {
        let parsed: TemplatesDoc = serde_yaml::from_str(doc)
            .map_err(|e| EngineError::Configuration(format!("item templates: {e}")))?;
        for (name, template) in parsed.templates {
            self.templates.insert(name, template);
        }
        for (tier, modifier) in parsed.rarity_modifiers {
            self.rarity_modifiers.insert(tier, modifier);
        }
        self.validate()
    }

    /// Dump the registry as the same YAML schema it loads from.
    pub fn to_yaml(&self) -> Result<String> {
        let doc = TemplatesDoc {
            templates: self.templates.clone(),
            rarity_modifiers: self.rarity_modifiers.clone(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, template) in &self.templates {
            if template.name_parts.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "item template '{name}' has no name parts"
                )));
            }
            if template.rarities.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "item template '{name}' lists no rarities"
                )));
            }
            for (stat, range) in &template.stat_ranges {
                if range.min > range.max {
                    return Err(EngineError::Configuration(format!(
                        "item template '{name}' stat '{stat}' has min > max"
                    )));
                }
            }
        }

        // Higher tiers must not scale worse than lower ones
        let mut prev: Option<(RarityTier, &RarityModifier)> = None;
        for (tier, modifier) in &self.rarity_modifiers {
            if !(0.0..=1.0).contains(&modifier.enchantment_chance) {
                return Err(EngineError::Configuration(format!(
                    "rarity modifier '{tier}' enchantment_chance outside [0, 1]"
                )));
            }
            if let Some((prev_tier, prev_modifier)) = prev {
                if modifier.stat_multiplier < prev_modifier.stat_multiplier
                    || modifier.value_multiplier < prev_modifier.value_multiplier
                {
                    return Err(EngineError::Configuration(format!(
                        "rarity modifier '{tier}' scales below '{prev_tier}'"
                    )));
                }
            }
            prev = Some((*tier, modifier));
        }
        Ok(())
    }

    pub fn template(&self, base_type: &str) -> Option<&ItemTemplate> {
        self.templates.get(base_type)
    }

    pub fn modifier(&self, tier: RarityTier) -> Option<&RarityModifier> {
        self.rarity_modifiers.get(&tier)
    }

    /// Base-type names in sorted order; iteration order is part of the
    /// determinism contract.
    pub fn type_names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

impl Default for ItemTemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Fallback weight per base type when no `weight` stat rolled.
pub fn default_weight(base_type: &str) -> f32 {
    match base_type {
        "weapon" => 3.5,
        "armor" => 8.0,
        "accessory" => 0.3,
        "consumable" => 0.5,
        _ => 1.0,
    }
}
