//! Central PCG manager: owns the generator catalogue and the seed manager,
//! derives a fresh child RNG per request, and records every runtime outcome
//! in the quality metrics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::metrics::QualityMetrics;
use crate::pcg::seed::{GenerationContext, SeedManager};
use crate::pcg::{ContentType, GeneratedContent, GenerationParams, Generator};

/// Coordinates the generator catalogue.
///
/// The catalogue is populated during startup only; the first `generate`
/// call seals it, and later registration panics by contract.
pub struct PcgManager {
    generators: RwLock<HashMap<ContentType, Arc<dyn Generator>>>,
    seeds: SeedManager,
    metrics: Arc<QualityMetrics>,
    started: AtomicBool,
}

impl PcgManager {
    pub fn new(master_seed: i64) -> Self {
        Self {
            generators: RwLock::new(HashMap::new()),
            seeds: SeedManager::new(master_seed),
            metrics: Arc::new(QualityMetrics::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Register a generator for its content type.
    ///
    /// # Panics
    ///
    /// Panics if called after the first `generate` call; the catalogue is
    /// startup-only.
    pub fn register(&self, generator: Arc<dyn Generator>) {
        if self.started.load(Ordering::Acquire) {
            panic!(
                "generator catalogue is sealed; cannot register '{}' after startup",
                generator.content_type()
            );
        }
        let content_type = generator.content_type();
        let replaced = self
            .generators
            .write()
            .insert(content_type, generator)
            .is_some();
        if replaced {
            warn!("replaced previously registered generator for {content_type}");
        }
        debug!("registered generator for {content_type}");
    }

    /// Register the full default catalogue. `ContentType::Levels` has no
    /// default generator.
    pub fn register_defaults(&self) {
        self.register(Arc::new(crate::pcg::items::ItemsGenerator::new()));
        self.register(Arc::new(crate::pcg::quests::QuestsGenerator::new()));
        self.register(Arc::new(crate::pcg::terrain::TerrainGenerator::new()));
        self.register(Arc::new(crate::pcg::characters::CharacterGenerator::new()));
        self.register(Arc::new(crate::pcg::dialogue::DialogueGenerator::new()));
        self.register(Arc::new(crate::pcg::spells::SpellGenerator::new()));
        self.register(Arc::new(crate::pcg::factions::FactionGenerator::new()));
    }

    pub fn seeds(&self) -> &SeedManager {
        &self.seeds
    }

    pub fn metrics(&self) -> Arc<QualityMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn registered_types(&self) -> Vec<ContentType> {
        let mut types: Vec<_> = self.generators.read().keys().copied().collect();
        types.sort();
        types
    }

    /// Generate one artifact.
    ///
    /// The child seed is a pure function of the request seed and the
    /// component label, so two fresh managers given identical params
    /// produce structurally identical artifacts. Validation failures
    /// return immediately and leave the metrics untouched; runtime
    /// failures are recorded alongside successes.
    pub async fn generate(
        &self,
        content_type: ContentType,
        params: GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<GeneratedContent> {
        self.started.store(true, Ordering::Release);

        let generator = self
            .generators
            .read()
            .get(&content_type)
            .cloned()
            .ok_or_else(|| EngineError::NoGenerator(content_type.label().to_string()))?;

        params.validate()?;
        generator.validate(&params)?;

        let component = format!("pcg.{}", content_type.label());
        let child_seed = SeedManager::derive(params.seed, &component);
        let timeout = params.timeout;
        let mut ctx = GenerationContext::new(
            content_type,
            component.clone(),
            child_seed,
            params,
            cancel.child_token(),
        );

        debug!(%content_type, child_seed, "generating content");
        let start = Instant::now();
        let outcome = match tokio::time::timeout(timeout, generator.generate(&mut ctx)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(format!(
                "generation of {content_type} exceeded {timeout:?}"
            ))),
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok(content) => {
                self.metrics.record_content_generation(
                    content_type,
                    &content.content_id(),
                    elapsed,
                    None,
                );
                Ok(content)
            }
            Err(err) => {
                self.metrics.record_content_generation(
                    content_type,
                    "",
                    elapsed,
                    Some(&err.to_string()),
                );
                // Deadline and cancellation outcomes surface as themselves;
                // generator failures get the content-type framing.
                match err {
                    e @ (EngineError::Timeout(_) | EngineError::Cancelled(_)) => Err(e),
                    e => Err(EngineError::Generation {
                        content_type: content_type.label().to_string(),
                        source: Box::new(e),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn content_type(&self) -> ContentType {
            ContentType::Spells
        }

        fn version(&self) -> &'static str {
            "test"
        }

        fn validate(&self, _params: &GenerationParams) -> Result<()> {
            Ok(())
        }

        async fn generate(&self, _ctx: &mut GenerationContext) -> Result<GeneratedContent> {
            Err(EngineError::Internal("exploded mid-generation".into()))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        fn content_type(&self) -> ContentType {
            ContentType::Dialogue
        }

        fn version(&self) -> &'static str {
            "test"
        }

        fn validate(&self, _params: &GenerationParams) -> Result<()> {
            Ok(())
        }

        async fn generate(&self, _ctx: &mut GenerationContext) -> Result<GeneratedContent> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("deadline fires first");
        }
    }

    #[tokio::test]
    async fn missing_generator_is_reported() {
        let manager = PcgManager::new(1);
        let result = manager
            .generate(
                ContentType::Levels,
                GenerationParams::new(7),
                &CancellationToken::new(),
            )
            .await;
        match result {
            Err(EngineError::NoGenerator(label)) => assert_eq!(label, "levels"),
            other => panic!("expected NoGenerator, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_failure_does_not_touch_metrics() {
        let manager = PcgManager::new(1);
        manager.register_defaults();

        let bad = GenerationParams::new(0);
        let result = manager
            .generate(ContentType::Items, bad, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let report = manager.metrics().generate_quality_report();
        assert_eq!(report.summary.total_generations, 0);
        assert_eq!(report.summary.total_failures, 0);
    }

    #[tokio::test]
    async fn runtime_failure_is_recorded_and_framed() {
        let manager = PcgManager::new(1);
        manager.register(Arc::new(FailingGenerator));

        let result = manager
            .generate(
                ContentType::Spells,
                GenerationParams::new(7),
                &CancellationToken::new(),
            )
            .await;
        match result {
            Err(EngineError::Generation { content_type, .. }) => {
                assert_eq!(content_type, "spells");
            }
            other => panic!("expected Generation framing, got {other:?}"),
        }

        let report = manager.metrics().generate_quality_report();
        assert_eq!(report.summary.total_generations, 1);
        assert_eq!(report.summary.total_failures, 1);
    }

    #[tokio::test]
    async fn deadline_produces_timeout() {
        let manager = PcgManager::new(1);
        manager.register(Arc::new(SlowGenerator));

        let params = GenerationParams::new(7).with_timeout(Duration::from_millis(20));
        let result = manager
            .generate(ContentType::Dialogue, params, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
    }

    #[tokio::test]
    #[should_panic(expected = "catalogue is sealed")]
    async fn post_startup_registration_panics() {
        let manager = PcgManager::new(1);
        manager.register_defaults();
        let _ = manager
            .generate(
                ContentType::Items,
                GenerationParams::new(7),
                &CancellationToken::new(),
            )
            .await;
        manager.register(Arc::new(FailingGenerator));
    }
}
