use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::{bson_datetime_as_chrono, course::ProgressStatus};

/// A finished study session; immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl LearningSession {
    pub fn new(
        learner_id: impl Into<String>,
        course_id: impl Into<String>,
        lesson_id: Option<String>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: super::new_id(),
            learner_id: learner_id.into(),
            course_id: course_id.into(),
            lesson_id,
            started_at,
            ended_at,
            duration_seconds: (ended_at - started_at).num_seconds().max(0),
        }
    }
}

/// Quiz attempt; `quiz_id` points at a lesson. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub quiz_id: String,
    pub score: i32,
    pub total_questions: i32,
    pub time_taken_seconds: i32,
    pub attempt_number: i32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// One row per (learner, lesson), overwritten in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LessonProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub lesson_id: String,
    pub progress_percent: i32,
    pub status: ProgressStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    pub fn new(learner_id: impl Into<String>, lesson_id: impl Into<String>, percent: i32) -> Self {
        Self {
            id: super::new_id(),
            learner_id: learner_id.into(),
            lesson_id: lesson_id.into(),
            progress_percent: percent,
            status: ProgressStatus::from_percent(percent),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    CourseStart,
    LessonProgress,
    QuizSubmitted,
    SessionEnded,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::CourseStart => "course_start",
            ActivityType::LessonProgress => "lesson_progress",
            ActivityType::QuizSubmitted => "quiz_submitted",
            ActivityType::SessionEnded => "session_ended",
        }
    }
}

/// Append-only audit trail of learner activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        learner_id: impl Into<String>,
        activity_type: ActivityType,
        detail: impl Into<String>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("detail".to_string(), Value::String(detail.into()));
        Self {
            id: super::new_id(),
            learner_id: learner_id.into(),
            activity_type,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self) -> &str {
        self.metadata
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// `"{activity_type}: {detail}"`
    pub fn summary(&self) -> String {
        format!("{}: {}", self.activity_type.as_str(), self.detail())
    }
}

#[derive(Debug, Deserialize)]
pub struct StartCourseRequest {
    pub course_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LessonProgressRequest {
    pub course_id: String,
    pub lesson_id: String,
    pub percent: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuizSubmitRequest {
    pub course_id: String,
    pub quiz_id: String,
    #[validate(range(min = 0, max = 100, message = "Score must be between 0 and 100"))]
    pub score: i32,
    #[validate(range(min = 1, message = "Quiz must have at least one question"))]
    pub total_questions: i32,
    #[validate(range(min = 0, message = "Time taken cannot be negative"))]
    pub time_taken_seconds: i32,
}

#[derive(Debug, Deserialize)]
pub struct SessionEndRequest {
    pub course_id: String,
    #[serde(default)]
    pub lesson_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TrackingAck {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct LessonProgressResponse {
    pub success: bool,
    pub percent: i32,
    pub status: ProgressStatus,
}

#[derive(Debug, Serialize)]
pub struct QuizSubmitResponse {
    pub success: bool,
    pub score: i32,
    pub attempt_number: i32,
}

#[derive(Debug, Serialize)]
pub struct SessionEndResponse {
    pub success: bool,
    pub duration: i64,
}
