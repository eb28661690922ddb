//! Quality metrics for the generation pipeline.
//!
//! A single recorder tracks generation events, player feedback, quest
//! completion, and cache hits, and aggregates them on demand into a graded
//! [`QualityReport`]. All counters live behind one mutex; a report is a
//! consistent snapshot.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pcg::ContentType;

/// Component weights for the overall score.
pub const WEIGHT_PERFORMANCE: f64 = 0.30;
pub const WEIGHT_VALIDATION: f64 = 0.25;
pub const WEIGHT_VARIETY: f64 = 0.15;
pub const WEIGHT_ENGAGEMENT: f64 = 0.20;
pub const WEIGHT_STABILITY: f64 = 0.10;

/// Operational thresholds checked in every report.
pub const THRESHOLD_CACHE_HIT_RATE: f64 = 0.60;
pub const THRESHOLD_AVG_GENERATION: Duration = Duration::from_millis(200);
pub const THRESHOLD_FAILURE_RATE: f64 = 0.05;
pub const THRESHOLD_AVG_RATING: f64 = 3.5;
pub const THRESHOLD_ABANDONMENT_RATE: f64 = 0.20;

const CRITICAL_FAILURE_RATE: f64 = 0.25;
const CRITICAL_AVG_RATING: f64 = 2.0;
const FEEDBACK_RING_CAPACITY: usize = 1000;

/// Engagement defaults to this neutral score until feedback arrives.
const NEUTRAL_ENGAGEMENT: f64 = 0.75;

/// Player-submitted feedback for one piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerFeedback {
    pub content_type: ContentType,
    pub content_id: String,
    /// 1.0..=5.0
    pub rating: f64,
    pub difficulty_rating: f64,
    pub enjoyment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct TypeStats {
    total: u64,
    failures: u64,
    total_duration: Duration,
    last_duration: Duration,
    last_error: Option<String>,
    distinct_ids: HashSet<String>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    per_type: HashMap<ContentType, TypeStats>,
    feedback: VecDeque<PlayerFeedback>,
    quests_completed: u64,
    quests_abandoned: u64,
    total_completion_time: Duration,
    cache_hits: u64,
    cache_misses: u64,
}

/// Thread-safe recorder for generation quality signals.
pub struct QualityMetrics {
    inner: Mutex<MetricsInner>,
    started_at: Instant,
}

impl QualityMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::default()),
            started_at: Instant::now(),
        }
    }

    /// Record the outcome of one generation. Validation failures never
    /// reach this; runtime failures do, with their error text.
    pub fn record_content_generation(
        &self,
        content_type: ContentType,
        content_id: &str,
        duration: Duration,
        error: Option<&str>,
    ) {
        let mut inner = self.inner.lock();
        let stats = inner.per_type.entry(content_type).or_default();
        stats.total += 1;
        stats.total_duration += duration;
        stats.last_duration = duration;
        match error {
            Some(message) => {
                stats.failures += 1;
                stats.last_error = Some(message.to_string());
            }
            None => {
                if !content_id.is_empty() {
                    stats.distinct_ids.insert(content_id.to_string());
                }
            }
        }
    }

    /// Append feedback to the bounded ring.
    pub fn record_player_feedback(&self, feedback: PlayerFeedback) {
        let mut inner = self.inner.lock();
        if inner.feedback.len() == FEEDBACK_RING_CAPACITY {
            inner.feedback.pop_front();
        }
        inner.feedback.push_back(feedback);
    }

    pub fn record_quest_completion(&self, quest_id: &str, time: Duration, completed: bool) {
        debug!(quest_id, completed, "quest outcome recorded");
        let mut inner = self.inner.lock();
        if completed {
            inner.quests_completed += 1;
            inner.total_completion_time += time;
        } else {
            inner.quests_abandoned += 1;
        }
    }

    pub fn record_cache_access(&self, hit: bool) {
        let mut inner = self.inner.lock();
        if hit {
            inner.cache_hits += 1;
        } else {
            inner.cache_misses += 1;
        }
    }

    /// Running mean ratings per content type over the feedback ring.
    pub fn feedback_means(&self) -> BTreeMap<ContentType, FeedbackMeans> {
        let inner = self.inner.lock();
        let mut sums: BTreeMap<ContentType, (f64, f64, f64, u64)> = BTreeMap::new();
        for fb in &inner.feedback {
            let entry = sums.entry(fb.content_type).or_insert((0.0, 0.0, 0.0, 0));
            entry.0 += fb.rating;
            entry.1 += fb.difficulty_rating;
            entry.2 += fb.enjoyment;
            entry.3 += 1;
        }
        sums.into_iter()
            .map(|(ty, (rating, difficulty, enjoyment, n))| {
                let n_f = n as f64;
                (
                    ty,
                    FeedbackMeans {
                        rating: rating / n_f,
                        difficulty: difficulty / n_f,
                        enjoyment: enjoyment / n_f,
                        samples: n,
                    },
                )
            })
            .collect()
    }

    /// Snapshot everything into a graded report.
    pub fn generate_quality_report(&self) -> QualityReport {
        let inner = self.inner.lock();

        let total: u64 = inner.per_type.values().map(|s| s.total).sum();
        let failures: u64 = inner.per_type.values().map(|s| s.failures).sum();
        let total_duration: Duration =
            inner.per_type.values().map(|s| s.total_duration).sum();
        let distinct: u64 = inner
            .per_type
            .values()
            .map(|s| s.distinct_ids.len() as u64)
            .sum();

        let failure_rate = if total > 0 {
            failures as f64 / total as f64
        } else {
            0.0
        };
        let avg_generation = if total > 0 {
            total_duration / total as u32
        } else {
            Duration::ZERO
        };
        let successes = total - failures;

        let feedback_count = inner.feedback.len();
        let avg_rating = if feedback_count > 0 {
            inner.feedback.iter().map(|f| f.rating).sum::<f64>() / feedback_count as f64
        } else {
            0.0
        };

        let quest_outcomes = inner.quests_completed + inner.quests_abandoned;
        let abandonment_rate = if quest_outcomes > 0 {
            inner.quests_abandoned as f64 / quest_outcomes as f64
        } else {
            0.0
        };

        let cache_total = inner.cache_hits + inner.cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            inner.cache_hits as f64 / cache_total as f64
        } else {
            1.0
        };

        // Component scores, each in [0, 1]
        let performance = if total == 0 {
            1.0
        } else {
            (THRESHOLD_AVG_GENERATION.as_secs_f64() / avg_generation.as_secs_f64().max(1e-9))
                .min(1.0)
        };
        let validation = 1.0 - failure_rate;
        let variety = if successes == 0 {
            1.0
        } else {
            (distinct as f64 / successes as f64).min(1.0)
        };
        let engagement = if feedback_count == 0 {
            NEUTRAL_ENGAGEMENT
        } else {
            (avg_rating / 5.0).clamp(0.0, 1.0)
        };
        let types_used = inner.per_type.len();
        let types_failing = inner
            .per_type
            .values()
            .filter(|s| s.failures > 0)
            .count();
        let stability = if types_used == 0 {
            1.0
        } else {
            1.0 - (types_failing as f64 / types_used as f64)
        };

        let overall = WEIGHT_PERFORMANCE * performance
            + WEIGHT_VALIDATION * validation
            + WEIGHT_VARIETY * variety
            + WEIGHT_ENGAGEMENT * engagement
            + WEIGHT_STABILITY * stability;

        let component_scores = BTreeMap::from([
            ("performance".to_string(), performance),
            ("validation".to_string(), validation),
            ("variety".to_string(), variety),
            ("engagement".to_string(), engagement),
            ("stability".to_string(), stability),
        ]);

        let mut thresholds = BTreeMap::new();
        thresholds.insert(
            "cache_hit_rate".to_string(),
            cache_hit_rate >= THRESHOLD_CACHE_HIT_RATE,
        );
        thresholds.insert(
            "average_generation_time".to_string(),
            avg_generation <= THRESHOLD_AVG_GENERATION,
        );
        thresholds.insert(
            "failure_rate".to_string(),
            failure_rate <= THRESHOLD_FAILURE_RATE,
        );
        thresholds.insert(
            "average_rating".to_string(),
            feedback_count == 0 || avg_rating >= THRESHOLD_AVG_RATING,
        );
        thresholds.insert(
            "abandonment_rate".to_string(),
            abandonment_rate <= THRESHOLD_ABANDONMENT_RATE,
        );

        let mut recommendations = Vec::new();
        if !thresholds["cache_hit_rate"] {
            recommendations.push(format!(
                "Cache hit rate {cache_hit_rate:.2} is below {THRESHOLD_CACHE_HIT_RATE}; \
                 widen template caching or pre-warm the hot content types."
            ));
        }
        if !thresholds["average_generation_time"] {
            recommendations.push(format!(
                "Average generation time {}ms exceeds {}ms; profile the slowest \
                 generator and move template work out of the hot path.",
                avg_generation.as_millis(),
                THRESHOLD_AVG_GENERATION.as_millis()
            ));
        }
        if !thresholds["failure_rate"] {
            recommendations.push(format!(
                "Failure rate {failure_rate:.2} exceeds {THRESHOLD_FAILURE_RATE}; \
                 inspect the last recorded errors per content type."
            ));
        }
        if !thresholds["average_rating"] {
            recommendations.push(format!(
                "Average player rating {avg_rating:.1} is below {THRESHOLD_AVG_RATING}; \
                 review feedback comments for the worst-rated content type."
            ));
        }
        if !thresholds["abandonment_rate"] {
            recommendations.push(format!(
                "Quest abandonment rate {abandonment_rate:.2} exceeds \
                 {THRESHOLD_ABANDONMENT_RATE}; objectives may be scaled too steep."
            ));
        }

        let mut critical_issues = Vec::new();
        if failure_rate > CRITICAL_FAILURE_RATE {
            critical_issues.push(format!(
                "CRITICAL: failure rate {failure_rate:.2} exceeds {CRITICAL_FAILURE_RATE}; \
                 the generator catalogue should be gated until resolved."
            ));
        }
        if feedback_count > 0 && avg_rating < CRITICAL_AVG_RATING {
            critical_issues.push(format!(
                "CRITICAL: average rating {avg_rating:.1} is below {CRITICAL_AVG_RATING}."
            ));
        }

        let per_type_counts = inner
            .per_type
            .iter()
            .map(|(ty, stats)| (ty.label().to_string(), stats.total))
            .collect();

        QualityReport {
            timestamp: Utc::now(),
            overall_score: overall,
            grade: grade_for(overall).to_string(),
            component_scores,
            thresholds,
            recommendations,
            critical_issues,
            summary: SystemSummary {
                uptime_secs: self.started_at.elapsed().as_secs(),
                total_generations: total,
                total_failures: failures,
                average_generation_ms: avg_generation.as_millis() as u64,
                per_type_counts,
                feedback_count: feedback_count as u64,
                quests_completed: inner.quests_completed,
                quests_abandoned: inner.quests_abandoned,
            },
        }
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Running feedback means for one content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackMeans {
    pub rating: f64,
    pub difficulty: f64,
    pub enjoyment: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSummary {
    pub uptime_secs: u64,
    pub total_generations: u64,
    pub total_failures: u64,
    pub average_generation_ms: u64,
    pub per_type_counts: BTreeMap<String, u64>,
    pub feedback_count: u64,
    pub quests_completed: u64,
    pub quests_abandoned: u64,
}

/// Immutable snapshot of system quality at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub grade: String,
    pub component_scores: BTreeMap<String, f64>,
    pub thresholds: BTreeMap<String, bool>,
    pub recommendations: Vec<String>,
    pub critical_issues: Vec<String>,
    pub summary: SystemSummary,
}

/// Letter grade ladder over the overall score.
pub fn grade_for(score: f64) -> &'static str {
    match score {
        s if s >= 0.90 => "A+",
        s if s >= 0.85 => "A",
        s if s >= 0.80 => "A-",
        s if s >= 0.75 => "B+",
        s if s >= 0.70 => "B",
        s if s >= 0.65 => "B-",
        s if s >= 0.60 => "C+",
        s if s >= 0.55 => "C",
        s if s >= 0.50 => "C-",
        s if s >= 0.40 => "D",
        _ => "F",
    }
}
