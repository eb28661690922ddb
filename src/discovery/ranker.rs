//! Multi-criteria priority ranker for testing candidates.
//!
//! Scores every non-excluded file on five axes, combines them under
//! normalized weights, and returns a deterministic ranking with
//! human-readable exclusion reasons for everything it skips.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::discovery::scanner::FileInfo;

/// Per-axis weights. Normalized before use if they do not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub dependency: f64,
    pub complexity: f64,
    pub size: f64,
    pub testability: f64,
    pub utility: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            dependency: 0.30,
            complexity: 0.25,
            size: 0.20,
            testability: 0.15,
            utility: 0.10,
        }
    }
}

impl RankWeights {
    fn sum(&self) -> f64 {
        self.dependency + self.complexity + self.size + self.testability + self.utility
    }

    /// Scale so the weights sum to 1 while preserving proportions.
    pub fn normalized(&self) -> RankWeights {
        let sum = self.sum();
        if sum <= 0.0 {
            return RankWeights::default();
        }
        RankWeights {
            dependency: self.dependency / sum,
            complexity: self.complexity / sum,
            size: self.size / sum,
            testability: self.testability / sum,
            utility: self.utility / sum,
        }
    }
}

/// Exclusion criteria; files outside these bands are reported but never
/// ranked.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub weights: RankWeights,
    pub max_imports: usize,
    pub min_lines: usize,
    pub max_lines: usize,
    pub max_complexity: u32,
    pub min_testability: i32,
    pub exclude_db_io: bool,
    pub exclude_network_io: bool,
    pub exclude_file_io: bool,
    pub exclude_generated: bool,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            weights: RankWeights::default(),
            max_imports: 25,
            min_lines: 5,
            max_lines: 1500,
            max_complexity: 80,
            min_testability: 20,
            exclude_db_io: true,
            exclude_network_io: false,
            exclude_file_io: false,
            exclude_generated: true,
        }
    }
}

/// Scored ranking entry for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileScore {
    pub path: PathBuf,
    pub dependency_score: f64,
    pub complexity_score: f64,
    pub size_score: f64,
    pub testability_score: f64,
    pub utility_score: f64,
    pub total_score: f64,
    pub is_excluded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<String>,
    pub selection_reason: String,
}

pub struct PriorityRanker {
    config: RankerConfig,
}

impl PriorityRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RankerConfig::default())
    }

    /// Score all files. Deterministic for a fixed file set and config:
    /// ranked entries sort by total descending with path as tiebreak, and
    /// excluded entries follow in path order with a zero total.
    pub fn rank(&self, files: &[FileInfo]) -> Vec<FileScore> {
        let weights = self.config.weights.normalized();
        let mut scored = Vec::with_capacity(files.len());

        for info in files {
            if let Some(reason) = self.exclusion_reason(info) {
                scored.push(FileScore {
                    path: info.path.clone(),
                    dependency_score: 0.0,
                    complexity_score: 0.0,
                    size_score: 0.0,
                    testability_score: 0.0,
                    utility_score: 0.0,
                    total_score: 0.0,
                    is_excluded: true,
                    exclusion_reason: Some(reason),
                    selection_reason: String::new(),
                });
                continue;
            }

            let dependency = dependency_score(info.import_count);
            let complexity = complexity_score(info.complexity);
            let size = size_score(info.line_count);
            let testability = f64::from(info.testability);
            let utility = utility_score(info);

            let total = weights.dependency * dependency
                + weights.complexity * complexity
                + weights.size * size
                + weights.testability * testability
                + weights.utility * utility;

            scored.push(FileScore {
                path: info.path.clone(),
                dependency_score: dependency,
                complexity_score: complexity,
                size_score: size,
                testability_score: testability,
                utility_score: utility,
                total_score: total,
                is_excluded: false,
                exclusion_reason: None,
                selection_reason: selection_reason(info, dependency, size),
            });
        }

        scored.sort_by(|a, b| {
            a.is_excluded
                .cmp(&b.is_excluded)
                .then(
                    b.total_score
                        .partial_cmp(&a.total_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.path.cmp(&b.path))
        });
        debug!(total = scored.len(), "ranking complete");
        scored
    }

    /// The first `n` ranked candidates; excluded files never appear.
    pub fn top_candidates(&self, files: &[FileInfo], n: usize) -> Vec<FileScore> {
        self.rank(files)
            .into_iter()
            .filter(|s| !s.is_excluded)
            .take(n)
            .collect()
    }

    fn exclusion_reason(&self, info: &FileInfo) -> Option<String> {
        if info.import_count > self.config.max_imports {
            return Some(format!(
                "has {} imports (limit {})",
                info.import_count, self.config.max_imports
            ));
        }
        if info.line_count > self.config.max_lines {
            return Some(format!(
                "file size {} lines exceeds limit {}",
                info.line_count, self.config.max_lines
            ));
        }
        if info.line_count < self.config.min_lines {
            return Some(format!(
                "file size {} lines is below minimum {}",
                info.line_count, self.config.min_lines
            ));
        }
        if self.config.exclude_generated && info.is_generated {
            return Some("generated file".to_string());
        }
        if self.config.exclude_db_io && info.has_db_io {
            return Some("performs database I/O".to_string());
        }
        if self.config.exclude_network_io && info.has_network_io {
            return Some("performs network I/O".to_string());
        }
        if self.config.exclude_file_io && info.has_file_io {
            return Some("performs file I/O".to_string());
        }
        if info.complexity > self.config.max_complexity {
            return Some(format!(
                "complexity {} exceeds limit {}",
                info.complexity, self.config.max_complexity
            ));
        }
        if info.testability < self.config.min_testability {
            return Some(format!(
                "testability {} is below floor {}",
                info.testability, self.config.min_testability
            ));
        }
        None
    }
}

/// 100 at <= 2 imports, minus 10 per extra import.
fn dependency_score(imports: usize) -> f64 {
    if imports <= 2 {
        100.0
    } else {
        (100.0 - 10.0 * (imports as f64 - 2.0)).max(0.0)
    }
}

/// 100 inside the [5, 15] window, penalized outside it.
fn complexity_score(complexity: u32) -> f64 {
    let c = f64::from(complexity);
    if (5.0..=15.0).contains(&c) {
        100.0
    } else if c < 5.0 {
        (100.0 - 5.0 * (5.0 - c)).max(0.0)
    } else {
        (100.0 - 3.0 * (c - 15.0)).max(0.0)
    }
}

/// 100 inside [50, 200] lines; shortfall costs more than overage.
fn size_score(lines: usize) -> f64 {
    let l = lines as f64;
    if (50.0..=200.0).contains(&l) {
        100.0
    } else if l < 50.0 {
        (100.0 - (50.0 - l)).max(0.0)
    } else {
        (100.0 - 0.3 * (l - 200.0)).max(0.0)
    }
}

fn is_utility_shaped(info: &FileInfo) -> bool {
    let name = info
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let utility_name =
        name.contains("util") || name.contains("helper") || name.contains("common");
    let no_io = !info.has_db_io && !info.has_network_io && !info.has_file_io;
    utility_name || no_io
}

fn requires_mocking(info: &FileInfo) -> bool {
    info.has_db_io || info.has_network_io
}

/// 50 base, bonused for utility shape and exported surface, penalized when
/// testing would require mocking.
fn utility_score(info: &FileInfo) -> f64 {
    let mut score = 50.0;
    if is_utility_shaped(info) {
        score += 30.0;
    }
    score += 5.0 * info.trait_count as f64;
    score += 2.0 * info.function_count as f64;
    score += 1.5 * info.method_count as f64;
    if requires_mocking(info) {
        score -= 20.0;
    }
    score.clamp(0.0, 100.0)
}

fn selection_reason(info: &FileInfo, dependency: f64, size: f64) -> String {
    let mut reasons = Vec::new();
    if dependency >= 90.0 {
        reasons.push("few dependencies");
    }
    if size >= 100.0 {
        reasons.push("ideal size for unit tests");
    }
    if (5..=15).contains(&info.complexity) {
        reasons.push("complexity in the sweet spot");
    }
    if !info.has_db_io && !info.has_network_io && !info.has_file_io {
        reasons.push("no external I/O");
    }
    if info.trait_count > 0 {
        reasons.push("defines traits worth contract tests");
    }
    if reasons.is_empty() {
        "meets all ranking criteria".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, lines: usize, imports: usize, complexity: u32) -> FileInfo {
        FileInfo {
            path: PathBuf::from(path),
            line_count: lines,
            import_count: imports,
            function_count: 3,
            method_count: 2,
            trait_count: 0,
            exported_functions: vec![],
            exported_types: vec![],
            complexity,
            testability: 80,
            has_tests: false,
            is_generated: false,
            has_network_io: false,
            has_db_io: false,
            has_file_io: false,
        }
    }

    #[test]
    fn axis_shapes_match_the_scoring_table() {
        assert_eq!(dependency_score(0), 100.0);
        assert_eq!(dependency_score(2), 100.0);
        assert_eq!(dependency_score(5), 70.0);
        assert_eq!(dependency_score(20), 0.0);

        assert_eq!(complexity_score(10), 100.0);
        assert_eq!(complexity_score(3), 90.0);
        assert_eq!(complexity_score(25), 70.0);

        assert_eq!(size_score(100), 100.0);
        assert_eq!(size_score(40), 90.0);
        assert_eq!(size_score(300), 70.0);
    }

    #[test]
    fn weights_normalize_preserving_proportions() {
        let weights = RankWeights {
            dependency: 3.0,
            complexity: 2.5,
            size: 2.0,
            testability: 1.5,
            utility: 1.0,
        };
        let normalized = weights.normalized();
        assert!((normalized.sum() - 1.0).abs() < 1e-9);
        assert!((normalized.dependency - 0.30).abs() < 1e-9);
        assert!((normalized.utility - 0.10).abs() < 1e-9);
    }

    #[test]
    fn ideal_file_outranks_a_sprawling_one() {
        let ranker = PriorityRanker::with_defaults();
        let files = vec![
            file("src/sprawl.rs", 900, 18, 60),
            file("src/tidy.rs", 120, 1, 8),
        ];
        let ranked = ranker.rank(&files);
        assert_eq!(ranked[0].path, PathBuf::from("src/tidy.rs"));
        assert!(ranked[0].total_score > ranked[1].total_score);
        assert!(!ranked[0].selection_reason.is_empty());
    }

    #[test]
    fn oversized_heavily_imported_db_file_is_excluded_with_a_reason() {
        let ranker = PriorityRanker::with_defaults();
        let mut monster = file("src/monster.rs", 2000, 30, 40);
        monster.has_db_io = true;

        let ranked = ranker.rank(&[monster]);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].is_excluded);
        assert_eq!(ranked[0].total_score, 0.0);
        let reason = ranked[0].exclusion_reason.as_deref().unwrap();
        assert!(
            reason.contains("imports") || reason.contains("size"),
            "reason was: {reason}"
        );

        // And it never shows up among candidates, regardless of N
        let top = ranker.top_candidates(
            &[
                {
                    let mut m = file("src/monster.rs", 2000, 30, 40);
                    m.has_db_io = true;
                    m
                },
                file("src/tidy.rs", 120, 1, 8),
            ],
            10,
        );
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, PathBuf::from("src/tidy.rs"));
    }

    #[test]
    fn empty_file_set_ranks_to_empty() {
        let ranker = PriorityRanker::with_defaults();
        assert!(ranker.rank(&[]).is_empty());
        assert!(ranker.top_candidates(&[], 10).is_empty());
    }

    #[test]
    fn low_testability_is_excluded_with_floor_reason() {
        let ranker = PriorityRanker::with_defaults();
        let mut fragile = file("src/fragile.rs", 100, 3, 10);
        fragile.testability = 5;
        let ranked = ranker.rank(&[fragile]);
        assert!(ranked[0].is_excluded);
        assert!(ranked[0]
            .exclusion_reason
            .as_deref()
            .unwrap()
            .contains("testability"));
    }

    #[test]
    fn ranking_is_deterministic_with_path_tiebreak() {
        let ranker = PriorityRanker::with_defaults();
        let files = vec![
            file("src/b.rs", 120, 1, 8),
            file("src/a.rs", 120, 1, 8),
        ];
        let first = ranker.rank(&files);
        let second = ranker.rank(&files);
        assert_eq!(first[0].path, PathBuf::from("src/a.rs"));
        assert_eq!(
            first.iter().map(|s| s.path.clone()).collect::<Vec<_>>(),
            second.iter().map(|s| s.path.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn utility_bonus_rewards_pure_helpers() {
        let mut helper = file("src/string_utils.rs", 100, 1, 8);
        helper.trait_count = 2;
        let score = utility_score(&helper);
        // 50 + 30 utility + 10 traits + 6 fns + 3 methods
        assert_eq!(score, 99.0);

        let mut networked = file("src/client.rs", 100, 1, 8);
        networked.has_network_io = true;
        assert!(utility_score(&networked) < score);
    }
}
