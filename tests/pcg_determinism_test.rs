//! End-to-end determinism guarantees of the generation pipeline: equal
//! inputs through fresh managers yield structurally equal artifacts.

use tokio_util::sync::CancellationToken;

use runeforge::pcg::{ContentType, GeneratedContent, GenerationParams, PcgManager};
use runeforge::EngineError;

fn fresh_manager() -> PcgManager {
    let manager = PcgManager::new(12345);
    manager.register_defaults();
    manager
}

#[tokio::test]
async fn identical_item_requests_on_fresh_managers_match_exactly() {
    let cancel = CancellationToken::new();
    let params = GenerationParams::new(12345)
        .with_player_level(5)
        .with_difficulty(3);

    let a = fresh_manager()
        .generate(ContentType::Items, params.clone(), &cancel)
        .await
        .unwrap();
    let b = fresh_manager()
        .generate(ContentType::Items, params, &cancel)
        .await
        .unwrap();

    match (a, b) {
        (GeneratedContent::Item(a), GeneratedContent::Item(b)) => {
            assert_eq!(a.id, b.id);
            assert_eq!(a.name, b.name);
            assert_eq!(a.stats, b.stats);
            assert_eq!(a.properties, b.properties);
            assert_eq!(a.enchantments, b.enchantments);
            assert_eq!(a.value, b.value);
            assert_eq!(a, b);
        }
        other => panic!("unexpected artifacts: {other:?}"),
    }
}

#[tokio::test]
async fn quest_chains_are_reproducible_across_managers() {
    let cancel = CancellationToken::new();
    let params = GenerationParams::new(777)
        .with_player_level(8)
        .with_difficulty(10)
        .with_constraint("chain_length", 5u64)
        .with_constraint("theme", "grimdark");

    let a = fresh_manager()
        .generate(ContentType::Quests, params.clone(), &cancel)
        .await
        .unwrap();
    let b = fresh_manager()
        .generate(ContentType::Quests, params, &cancel)
        .await
        .unwrap();

    match (a, b) {
        (GeneratedContent::QuestChain(a), GeneratedContent::QuestChain(b)) => {
            assert_eq!(a.len(), 5);
            assert_eq!(a, b);
        }
        other => panic!("unexpected artifacts: {other:?}"),
    }
}

#[tokio::test]
async fn different_request_seeds_produce_different_artifacts() {
    let cancel = CancellationToken::new();
    let manager = fresh_manager();

    let a = manager
        .generate(
            ContentType::Items,
            GenerationParams::new(1000).with_player_level(5),
            &cancel,
        )
        .await
        .unwrap();
    let b = manager
        .generate(
            ContentType::Items,
            GenerationParams::new(1001).with_player_level(5),
            &cancel,
        )
        .await
        .unwrap();

    assert_ne!(a.content_id(), b.content_id());
}

#[tokio::test]
async fn content_types_draw_isolated_streams_from_one_seed() {
    let cancel = CancellationToken::new();
    let manager = fresh_manager();
    let params = GenerationParams::new(555).with_player_level(5).with_difficulty(5);

    // Same request seed, different component labels: artifacts exist and
    // carry unrelated ids
    let item = manager
        .generate(ContentType::Items, params.clone(), &cancel)
        .await
        .unwrap();
    let quest = manager
        .generate(ContentType::Quests, params, &cancel)
        .await
        .unwrap();
    assert_ne!(item.content_id(), quest.content_id());
}

#[tokio::test]
async fn unregistered_type_fails_with_no_generator() {
    let cancel = CancellationToken::new();
    let manager = fresh_manager();
    let result = manager
        .generate(ContentType::Levels, GenerationParams::new(5), &cancel)
        .await;
    assert!(matches!(result, Err(EngineError::NoGenerator(_))));
}

#[tokio::test]
async fn successful_generations_show_up_in_the_quality_report() {
    let cancel = CancellationToken::new();
    let manager = fresh_manager();

    for seed in 1..=10 {
        manager
            .generate(
                ContentType::Items,
                GenerationParams::new(seed).with_player_level(3),
                &cancel,
            )
            .await
            .unwrap();
    }

    let report = manager.metrics().generate_quality_report();
    assert_eq!(report.summary.total_generations, 10);
    assert_eq!(report.summary.total_failures, 0);
    assert!(report.thresholds["failure_rate"]);
    assert!(report.overall_score >= 0.75);
    assert!(["A+", "A", "A-", "B+", "B"].contains(&report.grade.as_str()));
}
