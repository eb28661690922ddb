//! Enchantment selection and application.
//!
//! The template table is built once at generator construction and cached;
//! nothing on the generation path reloads configuration.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::pcg::items::templates::RarityModifier;
use crate::pcg::items::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnchantmentKind {
    WeaponBonus,
    ArmorBonus,
    DamageType,
    Resistance,
    Utility,
}

/// An enchantment applied to a generated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enchantment {
    pub name: String,
    pub kind: EnchantmentKind,
    pub power: i32,
}

/// Selectable enchantment blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnchantmentTemplate {
    pub name: String,
    pub kind: EnchantmentKind,
    pub min_level: u8,
    pub max_level: u8,
    /// Base types this enchantment fits; empty means any
    #[serde(default)]
    pub restrictions: Vec<String>,
}

pub struct EnchantmentSystem {
    templates: Vec<EnchantmentTemplate>,
}

impl EnchantmentSystem {
    pub fn with_defaults() -> Self {
        Self {
            templates: vec![
                EnchantmentTemplate {
                    name: "of Embers".into(),
                    kind: EnchantmentKind::DamageType,
                    min_level: 1,
                    max_level: 20,
                    restrictions: vec!["weapon".into()],
                },
                EnchantmentTemplate {
                    name: "of Frost".into(),
                    kind: EnchantmentKind::DamageType,
                    min_level: 3,
                    max_level: 20,
                    restrictions: vec!["weapon".into()],
                },
                EnchantmentTemplate {
                    name: "of Venom".into(),
                    kind: EnchantmentKind::DamageType,
                    min_level: 8,
                    max_level: 20,
                    restrictions: vec!["weapon".into()],
                },
                EnchantmentTemplate {
                    name: "of Keen Edges".into(),
                    kind: EnchantmentKind::WeaponBonus,
                    min_level: 1,
                    max_level: 20,
                    restrictions: vec!["weapon".into()],
                },
                EnchantmentTemplate {
                    name: "of the Bulwark".into(),
                    kind: EnchantmentKind::ArmorBonus,
                    min_level: 1,
                    max_level: 20,
                    restrictions: vec!["armor".into()],
                },
                EnchantmentTemplate {
                    name: "of Warding".into(),
                    kind: EnchantmentKind::Resistance,
                    min_level: 5,
                    max_level: 20,
                    restrictions: vec!["armor".into(), "accessory".into()],
                },
                EnchantmentTemplate {
                    name: "of Featherweight".into(),
                    kind: EnchantmentKind::Utility,
                    min_level: 1,
                    max_level: 12,
                    restrictions: vec!["armor".into(), "accessory".into()],
                },
                EnchantmentTemplate {
                    name: "of the Owl".into(),
                    kind: EnchantmentKind::Utility,
                    min_level: 1,
                    max_level: 20,
                    restrictions: vec![],
                },
            ],
        }
    }

    /// Every restriction must name a known base type.
    pub fn validate_against(&self, known_types: &[String]) -> Result<()> {
        for template in &self.templates {
            if template.min_level > template.max_level {
                return Err(EngineError::Configuration(format!(
                    "enchantment '{}' has an empty level band",
                    template.name
                )));
            }
            for restriction in &template.restrictions {
                if !known_types.iter().any(|t| t == restriction) {
                    return Err(EngineError::Configuration(format!(
                        "enchantment '{}' restricts to unknown item type '{restriction}'",
                        template.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply up to `modifier.max_enchantments` enchantments to the item.
    ///
    /// Candidates are filtered by base type and level band; each slot rolls
    /// the modifier's own chance. Duplicates are rejected by name, and the
    /// first applied enchantment augments the item name with its label.
    pub fn apply(
        &self,
        rng: &mut StdRng,
        item: &mut Item,
        modifier: &RarityModifier,
        player_level: u8,
    ) {
        let candidates: Vec<&EnchantmentTemplate> = self
            .templates
            .iter()
            .filter(|t| {
                (t.restrictions.is_empty() || t.restrictions.iter().any(|r| r == &item.base_type))
                    && (t.min_level..=t.max_level).contains(&player_level)
            })
            .collect();
        if candidates.is_empty() || modifier.max_enchantments == 0 {
            return;
        }

        for _ in 0..modifier.max_enchantments {
            if !rng.random_bool(modifier.enchantment_chance.clamp(0.0, 1.0)) {
                continue;
            }
            let template = candidates[rng.random_range(0..candidates.len())];
            if item.enchantments.iter().any(|e| e.name == template.name) {
                continue;
            }

            let power = power_for(template.kind, player_level);
            let first = item.enchantments.is_empty();
            item.enchantments.push(Enchantment {
                name: template.name.clone(),
                kind: template.kind,
                power,
            });
            if first {
                item.name = format!("{} {}", item.name, template.name);
            }
        }
    }
}

impl Default for EnchantmentSystem {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Numeric bonus for an enchantment, capped per kind.
fn power_for(kind: EnchantmentKind, player_level: u8) -> i32 {
    let level = i32::from(player_level);
    match kind {
        EnchantmentKind::WeaponBonus => (1 + level / 5).min(5),
        EnchantmentKind::ArmorBonus => (1 + level / 7).min(3),
        EnchantmentKind::DamageType | EnchantmentKind::Resistance => (1 + level / 4).min(6),
        EnchantmentKind::Utility => 1,
    }
}
