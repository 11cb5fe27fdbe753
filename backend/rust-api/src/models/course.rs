use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Course stored in the "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonKind,
    pub duration_minutes: i32,
    pub order_index: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    #[default]
    Video,
    Document,
    Quiz,
}

/// Completion state shared by enrollments and lesson progress rows.
///
/// Always derived from a percent via [`ProgressStatus::from_percent`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn from_percent(percent: i32) -> Self {
        match percent {
            p if p <= 0 => ProgressStatus::NotStarted,
            p if p >= 100 => ProgressStatus::Completed,
            _ => ProgressStatus::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "NOT_STARTED",
            ProgressStatus::InProgress => "IN_PROGRESS",
            ProgressStatus::Completed => "COMPLETED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

/// Clamp a client-supplied percent into 0..=100.
pub fn clamp_percent(value: i64) -> i32 {
    value.clamp(0, 100) as i32
}

/// One row per (learner, course); unique on the pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub progress_percent: i32,
    pub status: ProgressStatus,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(learner_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            learner_id: learner_id.into(),
            course_id: course_id.into(),
            progress_percent: 0,
            status: ProgressStatus::NotStarted,
            enrolled_at: now,
            updated_at: now,
        }
    }

    /// Sets percent and status together; the only way progress changes.
    pub fn apply_progress(&mut self, requested_percent: i64, now: DateTime<Utc>) {
        self.progress_percent = clamp_percent(requested_percent);
        self.status = ProgressStatus::from_percent(self.progress_percent);
        self.updated_at = now;
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,
    pub description: Option<String>,
}

impl CreateCourseRequest {
    /// Strips surrounding whitespace so length checks see the stored title.
    pub fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: LessonKind,
    #[serde(default)]
    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration_minutes: i32,
    #[serde(default)]
    pub order_index: i32,
}

impl CreateLessonRequest {
    pub fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub progress_percent: i64,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        CourseResponse {
            id: course.id,
            title: course.title,
            description: course.description,
            created_by: course.created_by,
            created_at: course.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonResponse {
    pub id: String,
    pub course_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonKind,
    pub duration_minutes: i32,
    pub order_index: i32,
}

impl From<Lesson> for LessonResponse {
    fn from(lesson: Lesson) -> Self {
        LessonResponse {
            id: lesson.id,
            course_id: lesson.course_id,
            title: lesson.title,
            kind: lesson.kind,
            duration_minutes: lesson.duration_minutes,
            order_index: lesson.order_index,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub success: bool,
    pub enrollment_id: String,
    pub course_id: String,
    pub status: ProgressStatus,
    pub progress: i32,
}

impl From<&Enrollment> for EnrollmentResponse {
    fn from(enrollment: &Enrollment) -> Self {
        EnrollmentResponse {
            success: true,
            enrollment_id: enrollment.id.clone(),
            course_id: enrollment.course_id.clone(),
            status: enrollment.status,
            progress: enrollment.progress_percent,
        }
    }
}

/// Entry of the learner's "my courses" listing
#[derive(Debug, Serialize)]
pub struct EnrolledCourse {
    pub course_id: String,
    pub course_name: String,
    pub description: Option<String>,
    pub enrollment_id: String,
    pub progress_percent: i32,
    pub status: ProgressStatus,
}
