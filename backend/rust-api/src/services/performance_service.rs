//! Learner performance rollup.
//!
//! Every mutating learner-activity request calls [`PerformanceRecomputer::recompute`]
//! before responding. The derivation itself is a set of pure functions over
//! [`AggregationInputs`]; the store applies it inside one transaction so a
//! failed recomputation never replaces the previous snapshot.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::{
    error::AppError,
    metrics::{PERFORMANCE_RECOMPUTATIONS_TOTAL, PERFORMANCE_RECOMPUTE_DURATION_SECONDS},
    models::{
        performance::{EngagementLevel, LearningTrend, PerformanceMetrics, PerformanceSnapshot},
        tracking::QuizAttempt,
    },
    store::{AggregationInputs, LearningStore},
};

/// Scores strictly below this mark a weak topic.
pub const WEAK_SCORE_THRESHOLD: i32 = 60;
pub const MAX_WEAK_TOPICS: usize = 5;
pub const RECENT_ATTEMPTS_FOR_TREND: usize = 3;
/// Points the recent average must move away from the overall average.
pub const TREND_DELTA: f64 = 5.0;

const HIGH_ENGAGEMENT_MIN_SESSIONS: usize = 20;
const HIGH_ENGAGEMENT_MIN_SECONDS: i64 = 3600;
const MEDIUM_ENGAGEMENT_MIN_SESSIONS: usize = 5;

/// Recomputation seam; callers never touch the snapshot store directly.
#[async_trait]
pub trait PerformanceRecomputer: Send + Sync {
    /// Rebuilds and persists the learner's snapshot.
    async fn recompute(&self, learner_id: &str) -> Result<PerformanceSnapshot, AppError>;

    /// Stored snapshot, computing one first when the learner has none.
    async fn current(&self, learner_id: &str) -> Result<PerformanceSnapshot, AppError>;
}

pub struct PerformanceAggregator {
    store: Arc<dyn LearningStore>,
}

impl PerformanceAggregator {
    pub fn new(store: Arc<dyn LearningStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PerformanceRecomputer for PerformanceAggregator {
    async fn recompute(&self, learner_id: &str) -> Result<PerformanceSnapshot, AppError> {
        let span = tracing::info_span!("recompute_performance", learner_id = %learner_id);

        async {
            let timer = PERFORMANCE_RECOMPUTE_DURATION_SECONDS.start_timer();
            let owner = learner_id.to_string();
            let derive =
                move |inputs: &AggregationInputs| derive_snapshot(&owner, inputs, Utc::now());

            let result = self.store.recompute_snapshot(learner_id, &derive).await;
            timer.observe_duration();

            match result {
                Ok(snapshot) => {
                    PERFORMANCE_RECOMPUTATIONS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    tracing::debug!(
                        "Snapshot recomputed: time={}s avg={:.2} completion={:.2} engagement={} trend={}",
                        snapshot.metrics.total_learning_time,
                        snapshot.metrics.average_score,
                        snapshot.metrics.completion_percentage,
                        snapshot.metrics.engagement_level.as_str(),
                        snapshot.metrics.learning_trend.as_str()
                    );
                    Ok(snapshot)
                }
                Err(e) => {
                    PERFORMANCE_RECOMPUTATIONS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    tracing::error!("Snapshot recomputation aborted: {}", e);
                    Err(AppError::Aggregation(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn current(&self, learner_id: &str) -> Result<PerformanceSnapshot, AppError> {
        match self.store.find_snapshot(learner_id).await? {
            Some(snapshot) => Ok(snapshot),
            None => self.recompute(learner_id).await,
        }
    }
}

pub fn derive_snapshot(
    learner_id: &str,
    inputs: &AggregationInputs,
    now: DateTime<Utc>,
) -> PerformanceSnapshot {
    PerformanceSnapshot {
        learner_id: learner_id.to_string(),
        metrics: derive_metrics(inputs),
        last_updated: now,
    }
}

pub fn derive_metrics(inputs: &AggregationInputs) -> PerformanceMetrics {
    let total_learning_time: i64 = inputs.sessions.iter().map(|s| s.duration_seconds).sum();

    let average_score = mean(inputs.attempts.iter().map(|a| i64::from(a.score)));
    let completion_percentage =
        mean(inputs.enrollments.iter().map(|e| i64::from(e.progress_percent)));

    let newest_first = newest_first(&inputs.attempts);
    let recent_scores: Vec<i32> = newest_first
        .iter()
        .take(RECENT_ATTEMPTS_FOR_TREND)
        .map(|a| a.score)
        .collect();

    PerformanceMetrics {
        total_learning_time,
        average_score,
        completion_percentage,
        weak_topics: weak_topics(&newest_first, inputs),
        engagement_level: engagement_level(inputs.sessions.len(), total_learning_time),
        learning_trend: learning_trend(average_score, &recent_scores),
    }
}

// Integer sum keeps the mean independent of iteration order.
fn mean(values: impl Iterator<Item = i64>) -> f64 {
    let (sum, count) = values.fold((0i64, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Attempts by creation time descending, ties broken by id descending.
fn newest_first(attempts: &[QuizAttempt]) -> Vec<&QuizAttempt> {
    let mut ordered: Vec<&QuizAttempt> = attempts.iter().collect();
    ordered.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    ordered
}

/// Titles of lessons with a failing attempt, most recent failure first,
/// deduplicated and capped at [`MAX_WEAK_TOPICS`].
fn weak_topics(newest_first: &[&QuizAttempt], inputs: &AggregationInputs) -> Vec<String> {
    let mut seen = HashSet::new();
    newest_first
        .iter()
        .filter(|a| a.score < WEAK_SCORE_THRESHOLD)
        .filter_map(|a| inputs.lesson_titles.get(&a.quiz_id))
        .filter(|title| seen.insert(title.as_str()))
        .take(MAX_WEAK_TOPICS)
        .cloned()
        .collect()
}

pub fn engagement_level(session_count: usize, total_learning_time: i64) -> EngagementLevel {
    if session_count > HIGH_ENGAGEMENT_MIN_SESSIONS
        && total_learning_time > HIGH_ENGAGEMENT_MIN_SECONDS
    {
        EngagementLevel::High
    } else if session_count > MEDIUM_ENGAGEMENT_MIN_SESSIONS {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

/// `recent_scores` are the newest attempts, at most [`RECENT_ATTEMPTS_FOR_TREND`].
pub fn learning_trend(average_score: f64, recent_scores: &[i32]) -> LearningTrend {
    if recent_scores.is_empty() || average_score == 0.0 {
        return LearningTrend::Stable;
    }

    let recent_avg = mean(recent_scores.iter().map(|s| i64::from(*s)));
    if recent_avg - average_score > TREND_DELTA {
        LearningTrend::Improving
    } else if average_score - recent_avg > TREND_DELTA {
        LearningTrend::Declining
    } else {
        LearningTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{course::Enrollment, tracking::LearningSession},
        store::{memory::InMemoryStore, EventStore, SnapshotStore},
    };
    use chrono::Duration;

    fn attempt(quiz_id: &str, score: i32, minutes_ago: i64) -> QuizAttempt {
        QuizAttempt {
            id: crate::models::new_id(),
            learner_id: "learner".to_string(),
            course_id: "course".to_string(),
            quiz_id: quiz_id.to_string(),
            score,
            total_questions: 10,
            time_taken_seconds: 60,
            attempt_number: 1,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn session(seconds: i64) -> LearningSession {
        let start = Utc::now();
        LearningSession::new("learner", "course", None, start, start + Duration::seconds(seconds))
    }

    fn titled(ids: &[&str]) -> std::collections::HashMap<String, String> {
        ids.iter()
            .map(|id| (id.to_string(), format!("Title {id}")))
            .collect()
    }

    #[test]
    fn test_empty_learner_gets_safe_defaults() {
        let metrics = derive_metrics(&AggregationInputs::default());
        assert_eq!(metrics, PerformanceMetrics::default());
        assert_eq!(metrics.engagement_level, EngagementLevel::Low);
        assert_eq!(metrics.learning_trend, LearningTrend::Stable);
    }

    #[test]
    fn test_totals_and_means() {
        let mut first = Enrollment::new("learner", "c1");
        first.apply_progress(40, Utc::now());
        let mut second = Enrollment::new("learner", "c2");
        second.apply_progress(100, Utc::now());

        let inputs = AggregationInputs {
            sessions: vec![session(120), session(30)],
            attempts: vec![attempt("q1", 80, 2), attempt("q2", 70, 1)],
            enrollments: vec![first, second],
            lesson_titles: titled(&["q1", "q2"]),
        };

        let metrics = derive_metrics(&inputs);
        assert_eq!(metrics.total_learning_time, 150);
        assert_eq!(metrics.average_score, 75.0);
        assert_eq!(metrics.completion_percentage, 70.0);
        assert!(metrics.weak_topics.is_empty());
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let inputs = AggregationInputs {
            sessions: vec![session(600); 7],
            attempts: vec![attempt("q1", 40, 3), attempt("q2", 90, 2), attempt("q3", 20, 1)],
            enrollments: vec![Enrollment::new("learner", "c1")],
            lesson_titles: titled(&["q1", "q2", "q3"]),
        };

        assert_eq!(derive_metrics(&inputs), derive_metrics(&inputs));
    }

    #[test]
    fn test_engagement_tiers() {
        assert_eq!(engagement_level(25, 4000), EngagementLevel::High);
        assert_eq!(engagement_level(10, 100), EngagementLevel::Medium);
        assert_eq!(engagement_level(3, 100_000), EngagementLevel::Low);
        // Many sessions but too little time falls back to medium
        assert_eq!(engagement_level(25, 3600), EngagementLevel::Medium);
        assert_eq!(engagement_level(21, 3601), EngagementLevel::High);
        assert_eq!(engagement_level(5, 0), EngagementLevel::Low);
        assert_eq!(engagement_level(6, 0), EngagementLevel::Medium);
    }

    #[test]
    fn test_engagement_counts_sessions_in_derivation() {
        let inputs = AggregationInputs {
            sessions: vec![session(160); 25],
            ..Default::default()
        };
        let metrics = derive_metrics(&inputs);
        assert_eq!(metrics.total_learning_time, 4000);
        assert_eq!(metrics.engagement_level, EngagementLevel::High);
    }

    #[test]
    fn test_trend_directions() {
        assert_eq!(learning_trend(50.0, &[70, 70, 70]), LearningTrend::Improving);
        assert_eq!(learning_trend(50.0, &[30, 30, 30]), LearningTrend::Declining);
        assert_eq!(learning_trend(50.0, &[52, 48, 50]), LearningTrend::Stable);
    }

    #[test]
    fn test_trend_is_stable_without_data() {
        assert_eq!(learning_trend(0.0, &[]), LearningTrend::Stable);
        assert_eq!(learning_trend(70.0, &[]), LearningTrend::Stable);
        assert_eq!(learning_trend(0.0, &[0, 0]), LearningTrend::Stable);
    }

    #[test]
    fn test_trend_uses_three_most_recent_attempts() {
        // Overall mean 50; newest three average 80
        let inputs = AggregationInputs {
            attempts: vec![
                attempt("q1", 80, 1),
                attempt("q1", 80, 2),
                attempt("q1", 80, 3),
                attempt("q1", 5, 4),
                attempt("q1", 5, 5),
            ],
            lesson_titles: titled(&["q1"]),
            ..Default::default()
        };
        let metrics = derive_metrics(&inputs);
        assert_eq!(metrics.average_score, 50.0);
        assert_eq!(metrics.learning_trend, LearningTrend::Improving);
    }

    #[test]
    fn test_weak_topics_below_threshold() {
        let ids = ["L1", "L2", "L3", "L4", "L5"];
        let scores = [40, 90, 55, 30, 65];
        let inputs = AggregationInputs {
            attempts: ids
                .iter()
                .zip(scores)
                .enumerate()
                .map(|(i, (id, score))| attempt(id, score, i as i64))
                .collect(),
            lesson_titles: ids.iter().map(|id| (id.to_string(), id.to_string())).collect(),
            ..Default::default()
        };

        let weak: HashSet<String> = derive_metrics(&inputs).weak_topics.into_iter().collect();
        let expected: HashSet<String> =
            ["L1", "L3", "L4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(weak, expected);
    }

    #[test]
    fn test_weak_topics_capped_and_most_recent_first() {
        let ids: Vec<String> = (0..10).map(|i| format!("L{i}")).collect();
        let inputs = AggregationInputs {
            // L0 is the newest attempt, L9 the oldest
            attempts: ids
                .iter()
                .enumerate()
                .map(|(i, id)| attempt(id, 10, i as i64))
                .collect(),
            lesson_titles: ids.iter().map(|id| (id.clone(), id.clone())).collect(),
            ..Default::default()
        };

        let weak = derive_metrics(&inputs).weak_topics;
        assert_eq!(weak, vec!["L0", "L1", "L2", "L3", "L4"]);
    }

    #[test]
    fn test_weak_topics_deduplicate_and_skip_missing_lessons() {
        let inputs = AggregationInputs {
            attempts: vec![
                attempt("q1", 10, 1),
                attempt("q1", 20, 2),
                attempt("gone", 5, 3),
            ],
            lesson_titles: titled(&["q1"]),
            ..Default::default()
        };
        assert_eq!(derive_metrics(&inputs).weak_topics, vec!["Title q1"]);
    }

    #[tokio::test]
    async fn test_recompute_overwrites_single_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = PerformanceAggregator::new(store.clone());

        let first = aggregator.recompute("learner").await.unwrap();
        assert_eq!(first.metrics, PerformanceMetrics::default());

        store.insert_session(&session(90)).await.unwrap();
        aggregator.recompute("learner").await.unwrap();

        let stored = store.find_snapshot("learner").await.unwrap().unwrap();
        assert_eq!(stored.learner_id, "learner");
        assert_eq!(stored.metrics.total_learning_time, 90);
    }

    #[tokio::test]
    async fn test_failed_recompute_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = PerformanceAggregator::new(store.clone());

        store.insert_session(&session(300)).await.unwrap();
        let before = aggregator.recompute("learner").await.unwrap();

        store.set_unavailable(true);
        let err = aggregator.recompute("learner").await.unwrap_err();
        assert!(matches!(err, AppError::Aggregation(_)));
        store.set_unavailable(false);

        let after = store.find_snapshot("learner").await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_current_computes_missing_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = PerformanceAggregator::new(store.clone());

        assert!(store.find_snapshot("learner").await.unwrap().is_none());
        let snapshot = aggregator.current("learner").await.unwrap();
        assert_eq!(snapshot.metrics, PerformanceMetrics::default());
        assert!(store.find_snapshot("learner").await.unwrap().is_some());
    }
}
