use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LearningTrend {
    Improving,
    Declining,
    Stable,
}

impl LearningTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningTrend::Improving => "improving",
            LearningTrend::Declining => "declining",
            LearningTrend::Stable => "stable",
        }
    }
}

/// Derived metrics; also the read surface exposed to dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub total_learning_time: i64,
    pub average_score: f64,
    pub completion_percentage: f64,
    pub weak_topics: Vec<String>,
    pub engagement_level: EngagementLevel,
    pub learning_trend: LearningTrend,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_learning_time: 0,
            average_score: 0.0,
            completion_percentage: 0.0,
            weak_topics: Vec::new(),
            engagement_level: EngagementLevel::Low,
            learning_trend: LearningTrend::Stable,
        }
    }
}

/// Exactly one per learner, keyed by learner id, replaced wholesale on
/// every recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSnapshot {
    #[serde(rename = "_id")]
    pub learner_id: String,
    pub metrics: PerformanceMetrics,
    #[serde(with = "bson_datetime_as_chrono")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub last_updated: DateTime<Utc>,
}

impl From<PerformanceSnapshot> for PerformanceResponse {
    fn from(snapshot: PerformanceSnapshot) -> Self {
        PerformanceResponse {
            success: true,
            metrics: snapshot.metrics,
            last_updated: snapshot.last_updated,
        }
    }
}
