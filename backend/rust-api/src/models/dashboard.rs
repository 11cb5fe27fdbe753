use chrono::{DateTime, Utc};
use serde::Serialize;

/// Enrollment status counts across the caller's courses
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct DashboardMetrics {
    pub total_participants: usize,
    pub yet_to_start: usize,
    pub in_progress: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct LearnerProgressRow {
    pub course_name: String,
    pub learner_name: String,
    pub learner_email: String,
    pub enrolled_date: DateTime<Utc>,
    pub completion_percentage: i32,
    pub status: &'static str,
    pub time_spent_seconds: i64,
}
