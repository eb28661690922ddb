//! Named bootstrap templates.
//!
//! Built-in templates cover the common profiles; a
//! `bootstrap_templates.yaml` under the data directory overrides or
//! extends them by name through the config-loader executor.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bootstrap::{BootstrapConfig, Complexity, GameLength, Genre};
use crate::error::{EngineError, Result};
use crate::resilience;

pub const TEMPLATES_FILE: &str = "bootstrap_templates.yaml";

/// A bootstrap profile minus the per-run fields (seed, data directory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapTemplate {
    pub description: String,
    pub game_length: GameLength,
    pub complexity: Complexity,
    pub genre: Genre,
    pub max_players: u32,
    pub starting_level: u8,
    #[serde(default)]
    pub enable_quick_start: bool,
}

impl BootstrapTemplate {
    /// Materialize into a runnable config.
    pub fn resolve(&self, world_seed: i64, data_dir: impl AsRef<Path>) -> BootstrapConfig {
        BootstrapConfig {
            game_length: self.game_length,
            complexity: self.complexity,
            genre: self.genre,
            max_players: self.max_players,
            starting_level: self.starting_level,
            world_seed,
            data_dir: data_dir.as_ref().to_path_buf(),
            enable_quick_start: self.enable_quick_start,
        }
    }
}

pub fn builtin_templates() -> BTreeMap<String, BootstrapTemplate> {
    BTreeMap::from([
        (
            "quick_demo".to_string(),
            BootstrapTemplate {
                description: "Small world for demos and smoke tests".into(),
                game_length: GameLength::Short,
                complexity: Complexity::Simple,
                genre: Genre::ClassicFantasy,
                max_players: 4,
                starting_level: 1,
                enable_quick_start: true,
            },
        ),
        (
            "standard_campaign".to_string(),
            BootstrapTemplate {
                description: "Balanced mid-length campaign".into(),
                game_length: GameLength::Medium,
                complexity: Complexity::Standard,
                genre: Genre::ClassicFantasy,
                max_players: 6,
                starting_level: 3,
                enable_quick_start: false,
            },
        ),
        (
            "epic_saga".to_string(),
            BootstrapTemplate {
                description: "Long high-magic campaign with dense content".into(),
                game_length: GameLength::Long,
                complexity: Complexity::Advanced,
                genre: Genre::HighMagic,
                max_players: 8,
                starting_level: 5,
                enable_quick_start: false,
            },
        ),
    ])
}

/// Built-ins merged with any template file under the data directory.
pub async fn load_templates(
    cancel: &CancellationToken,
    data_dir: impl AsRef<Path>,
) -> Result<BTreeMap<String, BootstrapTemplate>> {
    let mut templates = builtin_templates();

    let path = data_dir.as_ref().join(TEMPLATES_FILE);
    let loader = resilience::config_loader();
    if loader.path_exists(cancel, &path).await.unwrap_or(false) {
        let contents = loader.read_to_string(cancel, &path).await?;
        let custom: BTreeMap<String, BootstrapTemplate> = serde_yaml::from_str(&contents)
            .map_err(|e| {
                EngineError::Configuration(format!("bootstrap templates file: {e}"))
            })?;
        debug!(count = custom.len(), "merged custom bootstrap templates");
        templates.extend(custom);
    }

    Ok(templates)
}

/// Resolve a template name into a full config.
pub async fn resolve_template(
    cancel: &CancellationToken,
    name: &str,
    world_seed: i64,
    data_dir: impl AsRef<Path>,
) -> Result<BootstrapConfig> {
    let templates = load_templates(cancel, &data_dir).await?;
    let template = templates.get(name).ok_or_else(|| {
        EngineError::Configuration(format!(
            "unknown bootstrap template '{name}'; known: {}",
            templates
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;
    Ok(template.resolve(world_seed, data_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtins_are_always_available() {
        crate::resilience::reset_all_for_tests();
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let templates = load_templates(&cancel, dir.path()).await.unwrap();
        assert!(templates.contains_key("quick_demo"));
        assert!(templates.contains_key("standard_campaign"));
        assert!(templates.contains_key("epic_saga"));
    }

    #[tokio::test]
    async fn file_templates_override_builtins_by_name() {
        crate::resilience::reset_all_for_tests();
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let overlay = r#"
quick_demo:
  description: Overridden demo
  game_length: short
  complexity: simple
  genre: grimdark
  max_players: 2
  starting_level: 1
  enable_quick_start: true
frontier_run:
  description: Custom frontier profile
  game_length: medium
  complexity: standard
  genre: low_fantasy
  max_players: 5
  starting_level: 2
"#;
        std::fs::write(dir.path().join(TEMPLATES_FILE), overlay).unwrap();

        let templates = load_templates(&cancel, dir.path()).await.unwrap();
        assert_eq!(templates["quick_demo"].genre, Genre::Grimdark);
        assert!(templates.contains_key("frontier_run"));
        // Untouched builtins survive
        assert!(templates.contains_key("epic_saga"));
    }

    #[tokio::test]
    async fn unknown_template_is_a_configuration_error() {
        crate::resilience::reset_all_for_tests();
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_template(&cancel, "no_such_profile", 42, dir.path()).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn resolving_fills_in_seed_and_data_dir() {
        crate::resilience::reset_all_for_tests();
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_template(&cancel, "standard_campaign", 777, dir.path())
            .await
            .unwrap();
        assert_eq!(config.world_seed, 777);
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.game_length, GameLength::Medium);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn malformed_template_file_is_rejected() {
        crate::resilience::reset_all_for_tests();
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TEMPLATES_FILE), "not: [valid").unwrap();
        let result = load_templates(&cancel, dir.path()).await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
