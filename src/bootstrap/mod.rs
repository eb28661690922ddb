//! # Bootstrap Orchestrator
//!
//! Turns a configuration profile into a complete playable world: plans a
//! fixed dependency-ordered sequence of generator invocations, threads the
//! master seed through per-stage child seeds, persists artifacts under
//! `<data_dir>/pcg/`, and verifies the result. Re-running against a
//! directory that already holds a `bootstrap_config.yaml` is an idempotent
//! no-op that returns the as-found world.

pub mod templates;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, PcgManager};
use crate::resilience;
use crate::world::World;

pub use templates::{builtin_templates, load_templates, resolve_template, BootstrapTemplate};

pub const PCG_DIR: &str = "pcg";
pub const CONFIG_FILE: &str = "bootstrap_config.yaml";
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameLength {
    Short,
    Medium,
    Long,
}

impl GameLength {
    pub fn parse(s: &str) -> Result<GameLength> {
        match s {
            "short" => Ok(GameLength::Short),
            "medium" => Ok(GameLength::Medium),
            "long" => Ok(GameLength::Long),
            other => Err(EngineError::Validation(format!(
                "unknown game length '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Standard,
    Advanced,
}

impl Complexity {
    pub fn parse(s: &str) -> Result<Complexity> {
        match s {
            "simple" => Ok(Complexity::Simple),
            "standard" => Ok(Complexity::Standard),
            "advanced" => Ok(Complexity::Advanced),
            other => Err(EngineError::Validation(format!(
                "unknown complexity '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    ClassicFantasy,
    Grimdark,
    HighMagic,
    LowFantasy,
}

impl Genre {
    pub fn parse(s: &str) -> Result<Genre> {
        match s {
            "classic_fantasy" => Ok(Genre::ClassicFantasy),
            "grimdark" => Ok(Genre::Grimdark),
            "high_magic" => Ok(Genre::HighMagic),
            "low_fantasy" => Ok(Genre::LowFantasy),
            other => Err(EngineError::Validation(format!("unknown genre '{other}'"))),
        }
    }

    /// Narrative theme handed to the quests generator.
    pub fn theme(&self) -> &'static str {
        match self {
            Genre::ClassicFantasy => "classic_fantasy",
            Genre::Grimdark => "grimdark",
            Genre::HighMagic => "high_magic",
            Genre::LowFantasy => "low_fantasy",
        }
    }

    /// Terrain biome matching the genre's mood.
    pub fn biome(&self) -> &'static str {
        match self {
            Genre::ClassicFantasy => "temperate",
            Genre::Grimdark => "wetland",
            Genre::HighMagic => "highland",
            Genre::LowFantasy => "frontier",
        }
    }
}

/// Resolved bootstrap profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub game_length: GameLength,
    pub complexity: Complexity,
    pub genre: Genre,
    pub max_players: u32,
    pub starting_level: u8,
    pub world_seed: i64,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub enable_quick_start: bool,
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_players < 1 {
            return Err(EngineError::Validation("max_players must be >= 1".into()));
        }
        if !(1..=20).contains(&self.starting_level) {
            return Err(EngineError::Validation(format!(
                "starting_level {} outside [1, 20]",
                self.starting_level
            )));
        }
        if self.world_seed == 0 {
            return Err(EngineError::Validation(
                "world_seed must be non-zero; derive one before bootstrapping".into(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(EngineError::Validation("data_dir must be set".into()));
        }
        Ok(())
    }

    fn scale(&self) -> StageScale {
        let (factions, characters, quests, dialogue, spells, items) = match self.game_length {
            GameLength::Short => (3, 8, 5, 6, 8, 10),
            GameLength::Medium => (4, 12, 8, 8, 12, 16),
            GameLength::Long => (6, 20, 14, 12, 20, 28),
        };
        let (terrain_size, difficulty, min_objectives, max_objectives) = match self.complexity {
            Complexity::Simple => (32, 3, 1, 2),
            Complexity::Standard => (48, 6, 1, 3),
            Complexity::Advanced => (64, 10, 2, 4),
        };
        StageScale {
            factions,
            characters,
            quests,
            dialogue,
            spells,
            items,
            terrain_size,
            difficulty,
            min_objectives,
            max_objectives,
        }
    }
}

struct StageScale {
    factions: u64,
    characters: u64,
    quests: u64,
    dialogue: u64,
    spells: u64,
    items: u64,
    terrain_size: u64,
    difficulty: u8,
    min_objectives: u64,
    max_objectives: u64,
}

/// Starter content bundle produced by the optional quick-start stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickStartScenario {
    pub opening_chain: Vec<crate::pcg::quests::Quest>,
    pub starter_items: Vec<crate::pcg::items::Item>,
}

pub struct BootstrapOrchestrator {
    config: BootstrapConfig,
}

impl BootstrapOrchestrator {
    pub fn new(config: BootstrapConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Build from a named template; seed and data directory come from the
    /// caller.
    pub async fn from_template(
        cancel: &CancellationToken,
        name: &str,
        world_seed: i64,
        data_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let config = resolve_template(cancel, name, world_seed, data_dir).await?;
        Self::new(config)
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Run the full bootstrap under the default two-minute deadline.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<World> {
        self.run_with_deadline(cancel, DEFAULT_DEADLINE).await
    }

    pub async fn run_with_deadline(
        &self,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<World> {
        match tokio::time::timeout(deadline, self.run_inner(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(format!(
                "bootstrap exceeded deadline of {deadline:?}"
            ))),
        }
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<World> {
        let fs = resilience::filesystem();
        let pcg_dir = self.config.data_dir.join(PCG_DIR);
        let config_path = pcg_dir.join(CONFIG_FILE);

        fs.create_dir_all(cancel, &self.config.data_dir).await?;

        // Idempotence: an existing configuration means a completed
        // bootstrap; skip generation and return the as-found world.
        if fs.path_exists(cancel, &config_path).await? {
            info!(
                path = %config_path.display(),
                "existing bootstrap configuration detected; skipping generation"
            );
            return self.load_existing(cancel, &pcg_dir).await;
        }

        // Fresh run: clear any partial artifacts, then recreate the tree
        fs.remove_dir_all(cancel, &pcg_dir).await?;
        fs.create_dir_all(cancel, &pcg_dir).await?;

        let manager = PcgManager::new(self.config.world_seed);
        manager.register_defaults();
        let mut world = World::new(self.config.world_seed);
        let scale = self.config.scale();
        let mut expected_files = Vec::new();

        info!(
            seed = self.config.world_seed,
            genre = ?self.config.genre,
            "bootstrap starting"
        );

        // Stage order is fixed: later stages consume earlier output.
        self.stage_factions(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_terrain(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_characters(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_quests(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_dialogue(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_spells(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        self.stage_items(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
            .await?;
        if self.config.enable_quick_start {
            self.stage_scenario(cancel, &manager, &mut world, &scale, &pcg_dir, &mut expected_files)
                .await?;
        }

        // Persist the resolved config last; its presence marks completion
        let config_yaml = serde_yaml::to_string(&self.config)?;
        fs.write(cancel, &config_path, config_yaml).await?;
        expected_files.push(config_path);

        self.verify(cancel, &expected_files).await?;
        info!(summary = ?world.summary().counts, "bootstrap complete");
        Ok(world)
    }

    fn check_cancelled(&self, cancel: &CancellationToken, stage: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled(format!(
                "bootstrap cancelled before stage '{stage}'"
            )));
        }
        Ok(())
    }

    fn base_params(&self, stage: &str, manager: &PcgManager, scale: &StageScale) -> GenerationParams {
        let seed = manager.seeds().child_seed(&format!("bootstrap.{stage}"));
        GenerationParams::new(seed)
            .with_player_level(self.config.starting_level)
            .with_difficulty(scale.difficulty)
            .with_timeout(Duration::from_secs(30))
    }

    async fn persist(
        &self,
        cancel: &CancellationToken,
        pcg_dir: &Path,
        stage: &str,
        payload: &impl Serialize,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let path = pcg_dir.join(format!("{stage}.yaml"));
        let yaml = serde_yaml::to_string(payload)?;
        resilience::filesystem().write(cancel, &path, yaml).await?;
        expected_files.push(path);
        Ok(())
    }

    fn wrap_stage<T>(stage: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| match e {
            cancelled @ EngineError::Cancelled(_) => cancelled,
            other => EngineError::BootstrapStage {
                stage: stage.to_string(),
                source: Box::new(other),
            },
        })
    }

    async fn stage_factions(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "factions";
        self.check_cancelled(cancel, STAGE)?;
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("count", scale.factions);
        let content = Self::wrap_stage(
            STAGE,
            manager.generate(ContentType::Factions, params, cancel).await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.factions, expected_files)
            .await
    }

    async fn stage_terrain(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "terrain";
        self.check_cancelled(cancel, STAGE)?;
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("width", scale.terrain_size)
            .with_constraint("height", scale.terrain_size)
            .with_constraint("biome", self.config.genre.biome());
        let content = Self::wrap_stage(
            STAGE,
            manager.generate(ContentType::Terrain, params, cancel).await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.terrain, expected_files)
            .await
    }

    async fn stage_characters(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "characters";
        self.check_cancelled(cancel, STAGE)?;
        let faction_ids: Vec<String> = world.factions.iter().map(|f| f.id.clone()).collect();
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("count", scale.characters)
            .with_constraint("faction_ids", serde_json::json!(faction_ids));
        let content = Self::wrap_stage(
            STAGE,
            manager
                .generate(ContentType::Characters, params, cancel)
                .await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.characters, expected_files)
            .await
    }

    async fn stage_quests(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "quests";
        // One invocation per quest keeps every quest independently seeded
        // and separately visible to the metrics.
        for i in 0..scale.quests {
            self.check_cancelled(cancel, STAGE)?;
            let seed = manager
                .seeds()
                .child_seed(&format!("bootstrap.{STAGE}.{i}"));
            let params = GenerationParams::new(seed)
                .with_player_level(self.config.starting_level)
                .with_difficulty(scale.difficulty)
                .with_timeout(Duration::from_secs(30))
                .with_constraint("theme", self.config.genre.theme())
                .with_constraint("min_objectives", scale.min_objectives)
                .with_constraint("max_objectives", scale.max_objectives);
            let content = Self::wrap_stage(
                STAGE,
                manager.generate(ContentType::Quests, params, cancel).await,
            )?;
            world.absorb(content);
        }
        self.persist(cancel, pcg_dir, STAGE, &world.quests, expected_files)
            .await
    }

    async fn stage_dialogue(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "dialogue";
        self.check_cancelled(cancel, STAGE)?;
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("count", scale.dialogue);
        let content = Self::wrap_stage(
            STAGE,
            manager.generate(ContentType::Dialogue, params, cancel).await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.dialogues, expected_files)
            .await
    }

    async fn stage_spells(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "spells";
        self.check_cancelled(cancel, STAGE)?;
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("count", scale.spells);
        let content = Self::wrap_stage(
            STAGE,
            manager.generate(ContentType::Spells, params, cancel).await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.spells, expected_files)
            .await
    }

    async fn stage_items(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "items";
        self.check_cancelled(cancel, STAGE)?;
        let params = self
            .base_params(STAGE, manager, scale)
            .with_constraint("count", scale.items);
        let content = Self::wrap_stage(
            STAGE,
            manager.generate(ContentType::Items, params, cancel).await,
        )?;
        world.absorb(content);
        self.persist(cancel, pcg_dir, STAGE, &world.items, expected_files)
            .await
    }

    async fn stage_scenario(
        &self,
        cancel: &CancellationToken,
        manager: &PcgManager,
        world: &mut World,
        scale: &StageScale,
        pcg_dir: &Path,
        expected_files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        const STAGE: &str = "scenario";
        self.check_cancelled(cancel, STAGE)?;

        let chain_params = self
            .base_params("scenario.chain", manager, scale)
            .with_constraint("theme", self.config.genre.theme())
            .with_constraint("chain_length", 3u64)
            .with_constraint("min_objectives", 1u64)
            .with_constraint("max_objectives", 2u64);
        let chain = Self::wrap_stage(
            STAGE,
            manager
                .generate(ContentType::Quests, chain_params, cancel)
                .await,
        )?;

        let items_params = self
            .base_params("scenario.items", manager, scale)
            .with_constraint("count", 4u64)
            .with_constraint("max_rarity", "uncommon");
        let starter = Self::wrap_stage(
            STAGE,
            manager
                .generate(ContentType::Items, items_params, cancel)
                .await,
        )?;

        let scenario = QuickStartScenario {
            opening_chain: match &chain {
                GeneratedContent::QuestChain(chain) => chain.clone(),
                GeneratedContent::Quest(quest) => vec![quest.clone()],
                _ => Vec::new(),
            },
            starter_items: match &starter {
                GeneratedContent::Items(items) => items.clone(),
                GeneratedContent::Item(item) => vec![item.clone()],
                _ => Vec::new(),
            },
        };
        world.absorb(chain);
        world.absorb(starter);
        self.persist(cancel, pcg_dir, STAGE, &scenario, expected_files)
            .await
    }

    /// Every artifact the stages promised must exist on disk.
    async fn verify(&self, cancel: &CancellationToken, expected: &[PathBuf]) -> Result<()> {
        let fs = resilience::filesystem();
        for path in expected {
            if !fs.path_exists(cancel, path).await? {
                return Err(EngineError::Configuration(format!(
                    "bootstrap verification failed: expected artifact missing at {}",
                    path.display()
                )));
            }
        }
        debug!(artifacts = expected.len(), "bootstrap artifacts verified");
        Ok(())
    }

    /// Rehydrate the world from artifacts written by a prior bootstrap.
    async fn load_existing(
        &self,
        cancel: &CancellationToken,
        pcg_dir: &Path,
    ) -> Result<World> {
        let fs = resilience::filesystem();
        let config_text = fs
            .read_to_string(cancel, pcg_dir.join(CONFIG_FILE))
            .await?;
        let stored: BootstrapConfig = serde_yaml::from_str(&config_text)
            .map_err(|e| EngineError::Configuration(format!("stored bootstrap config: {e}")))?;
        if stored.world_seed != self.config.world_seed {
            warn!(
                stored = stored.world_seed,
                requested = self.config.world_seed,
                "existing world was built from a different seed; returning it unchanged"
            );
        }

        let mut world = World::new(stored.world_seed);
        world.factions = self
            .read_artifact(cancel, pcg_dir, "factions")
            .await?
            .unwrap_or_default();
        world.terrain = self
            .read_artifact(cancel, pcg_dir, "terrain")
            .await?
            .unwrap_or_default();
        world.characters = self
            .read_artifact(cancel, pcg_dir, "characters")
            .await?
            .unwrap_or_default();
        world.quests = self
            .read_artifact(cancel, pcg_dir, "quests")
            .await?
            .unwrap_or_default();
        world.dialogues = self
            .read_artifact(cancel, pcg_dir, "dialogue")
            .await?
            .unwrap_or_default();
        world.spells = self
            .read_artifact(cancel, pcg_dir, "spells")
            .await?
            .unwrap_or_default();
        world.items = self
            .read_artifact(cancel, pcg_dir, "items")
            .await?
            .unwrap_or_default();
        Ok(world)
    }

    async fn read_artifact<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        pcg_dir: &Path,
        stage: &str,
    ) -> Result<Option<T>> {
        let fs = resilience::filesystem();
        let path = pcg_dir.join(format!("{stage}.yaml"));
        if !fs.path_exists(cancel, &path).await? {
            return Ok(None);
        }
        let text = fs.read_to_string(cancel, &path).await?;
        let value = serde_yaml::from_str(&text).map_err(|e| {
            EngineError::Configuration(format!("stored artifact '{stage}': {e}"))
        })?;
        Ok(Some(value))
    }
}

/// Shared handle form used by callers that keep the world around.
pub type SharedWorld = Arc<World>;

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> BootstrapConfig {
        BootstrapConfig {
            game_length: GameLength::Short,
            complexity: Complexity::Simple,
            genre: Genre::ClassicFantasy,
            max_players: 4,
            starting_level: 1,
            world_seed: 4242,
            data_dir: dir.to_path_buf(),
            enable_quick_start: false,
        }
    }

    #[test]
    fn config_validation_catches_bad_profiles() {
        let dir = PathBuf::from("/tmp/rf-test");
        let good = config(&dir);
        assert!(good.validate().is_ok());

        assert!(BootstrapConfig {
            max_players: 0,
            ..good.clone()
        }
        .validate()
        .is_err());
        assert!(BootstrapConfig {
            starting_level: 0,
            ..good.clone()
        }
        .validate()
        .is_err());
        assert!(BootstrapConfig {
            world_seed: 0,
            ..good
        }
        .validate()
        .is_err());
    }

    #[test]
    fn enum_parsing_matches_cli_values() {
        assert_eq!(GameLength::parse("short").unwrap(), GameLength::Short);
        assert_eq!(Complexity::parse("advanced").unwrap(), Complexity::Advanced);
        assert_eq!(Genre::parse("high_magic").unwrap(), Genre::HighMagic);
        assert!(GameLength::parse("endless").is_err());
        assert!(Genre::parse("cosmic_horror").is_err());
    }

    #[test]
    fn scale_grows_with_length() {
        let dir = PathBuf::from("/tmp/rf-test");
        let short = config(&dir).scale();
        let long = BootstrapConfig {
            game_length: GameLength::Long,
            ..config(&dir)
        }
        .scale();
        assert!(long.quests > short.quests);
        assert!(long.items > short.items);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_first_stage() {
        crate::resilience::reset_all_for_tests();
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = BootstrapOrchestrator::new(config(dir.path())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator.run(&cancel).await;
        assert!(result.unwrap_err().is_cancellation());
        // Nothing was completed, so no config marker exists
        assert!(!dir.path().join(PCG_DIR).join(CONFIG_FILE).exists());
    }
}
