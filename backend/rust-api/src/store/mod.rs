//! Persistence seams for the learning backend.
//!
//! Services depend on [`LearningStore`] only; MongoDB backs production and
//! [`memory::InMemoryStore`] backs local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::{
    course::{Course, Enrollment, Lesson},
    performance::PerformanceSnapshot,
    tracking::{ActivityLogEntry, LearningSession, LessonProgress, QuizAttempt},
    tutor::Conversation,
    user::{Role, User},
};

pub mod memory;
pub mod mongo;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated; nothing was written.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything the aggregator reads for one learner, captured inside the
/// same transaction that writes the resulting snapshot.
#[derive(Debug, Clone, Default)]
pub struct AggregationInputs {
    pub sessions: Vec<LearningSession>,
    pub attempts: Vec<QuizAttempt>,
    pub enrollments: Vec<Enrollment>,
    /// Lesson id -> title for every lesson referenced by `attempts`.
    pub lesson_titles: HashMap<String, String>,
}

/// Pure derivation applied by [`SnapshotStore::recompute_snapshot`].
pub type DeriveSnapshot<'a> = &'a (dyn Fn(&AggregationInputs) -> PerformanceSnapshot + Send + Sync);

/// Users, courses, lessons and enrollments
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_subject(&self, subject: &str) -> StoreResult<Option<User>>;

    /// Fails with [`StoreError::Conflict`] when the subject is already known.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn update_user_role(&self, id: &str, role: Role) -> StoreResult<()>;

    async fn insert_course(&self, course: &Course) -> StoreResult<()>;

    async fn update_course(&self, course: &Course) -> StoreResult<()>;

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>>;

    /// All courses, or only those created by `created_by`.
    async fn list_courses(&self, created_by: Option<&str>) -> StoreResult<Vec<Course>>;

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()>;

    async fn find_lesson(&self, id: &str) -> StoreResult<Option<Lesson>>;

    /// Lessons of a course ordered by `order_index`.
    async fn list_lessons(&self, course_id: &str) -> StoreResult<Vec<Lesson>>;

    /// Fails with [`StoreError::Conflict`] when the (learner, course) pair exists.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()>;

    async fn find_enrollment(&self, id: &str) -> StoreResult<Option<Enrollment>>;

    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> StoreResult<()>;

    /// Ordered by enrollment time, oldest first.
    async fn enrollments_for_learner(&self, learner_id: &str) -> StoreResult<Vec<Enrollment>>;

    async fn enrollments_for_courses(&self, course_ids: &[String]) -> StoreResult<Vec<Enrollment>>;
}

/// Learning activity records
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_session(&self, session: &LearningSession) -> StoreResult<()>;

    async fn sessions_for_learner(&self, learner_id: &str) -> StoreResult<Vec<LearningSession>>;

    async fn count_quiz_attempts(&self, learner_id: &str, quiz_id: &str) -> StoreResult<u64>;

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;

    /// Insert-or-overwrite keyed by (learner, lesson); the stored row keeps
    /// its original id.
    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> StoreResult<()>;

    async fn find_lesson_progress(
        &self,
        learner_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>>;

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()>;

    /// Newest first, at most `limit` entries.
    async fn recent_activity(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ActivityLogEntry>>;
}

/// Single snapshot per learner
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the learner's inputs, applies `derive` and upserts the result as
    /// one atomic unit. On error nothing is written.
    async fn recompute_snapshot(
        &self,
        learner_id: &str,
        derive: DeriveSnapshot<'_>,
    ) -> StoreResult<PerformanceSnapshot>;

    async fn find_snapshot(&self, learner_id: &str) -> StoreResult<Option<PerformanceSnapshot>>;
}

/// Tutor conversation log
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    async fn count_conversations(&self, learner_id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait LearningStore: CatalogStore + EventStore + SnapshotStore + ConversationStore {
    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}
