use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{bson_datetime_as_chrono, performance::PerformanceMetrics};

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Prompt must be between 1 and 1000 characters"
    ))]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Stored tutor exchange ("ai_conversations" collection)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub prompt: String,
    pub response: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        learner_id: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: super::new_id(),
            learner_id: learner_id.into(),
            prompt: prompt.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Bounded summary of a learner fed into the tutor prompt.
///
/// Field order is the serialized key order: `courses`, `performance`,
/// `recent_activity`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TutorContext {
    pub courses: Vec<CourseContext>,
    pub performance: PerformanceContext,
    pub recent_activity: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseContext {
    pub name: String,
    pub completion: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceContext {
    pub average_score: f64,
    pub weak_topics: Vec<String>,
    pub learning_trend: String,
    pub engagement: String,
}

impl PerformanceContext {
    /// Shape used when a learner has no snapshot yet.
    pub fn unknown() -> Self {
        Self {
            average_score: 0.0,
            weak_topics: Vec::new(),
            learning_trend: "unknown".to_string(),
            engagement: "unknown".to_string(),
        }
    }
}

impl From<&PerformanceMetrics> for PerformanceContext {
    fn from(metrics: &PerformanceMetrics) -> Self {
        Self {
            average_score: metrics.average_score,
            weak_topics: metrics.weak_topics.clone(),
            learning_trend: metrics.learning_trend.as_str().to_string(),
            engagement: metrics.engagement_level.as_str().to_string(),
        }
    }
}
