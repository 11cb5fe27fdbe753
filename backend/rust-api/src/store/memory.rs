use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use super::{
    AggregationInputs, CatalogStore, ConversationStore, DeriveSnapshot, EventStore,
    LearningStore, SnapshotStore, StoreError, StoreResult,
};
use crate::models::{
    course::{Course, Enrollment, Lesson},
    performance::PerformanceSnapshot,
    tracking::{ActivityLogEntry, LearningSession, LessonProgress, QuizAttempt},
    tutor::Conversation,
    user::{Role, User},
};

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    courses: Vec<Course>,
    lessons: Vec<Lesson>,
    enrollments: Vec<Enrollment>,
    sessions: Vec<LearningSession>,
    attempts: Vec<QuizAttempt>,
    lesson_progress: Vec<LessonProgress>,
    activity: Vec<ActivityLogEntry>,
    snapshots: HashMap<String, PerformanceSnapshot>,
    conversations: Vec<Conversation>,
}

/// Process-local store. A single lock guards all collections, so each call
/// (and each snapshot recomputation) observes and mutates one consistent
/// state.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    snapshot_writes_fail: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// While set, snapshot recomputation aborts after deriving and before
    /// writing; every other operation keeps working.
    pub fn set_snapshot_writes_failing(&self, failing: bool) {
        self.snapshot_writes_fail.store(failing, Ordering::SeqCst);
    }

    async fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("in-memory store unavailable".to_string()));
        }
        Ok(self.state.lock().await)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let state = self.lock().await?;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        let state = self.lock().await?;
        Ok(state
            .users
            .iter()
            .find(|user| user.subject == subject)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.lock().await?;
        if state.users.iter().any(|existing| existing.subject == user.subject) {
            return Err(StoreError::Conflict("User already exists".to_string()));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn update_user_role(&self, id: &str, role: Role) -> StoreResult<()> {
        let mut state = self.lock().await?;
        match state.users.iter_mut().find(|user| user.id == id) {
            Some(user) => {
                user.role = role;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("User {} vanished", id))),
        }
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.courses.push(course.clone());
        Ok(())
    }

    async fn update_course(&self, course: &Course) -> StoreResult<()> {
        let mut state = self.lock().await?;
        match state.courses.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => {
                *existing = course.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("Course {} vanished", course.id))),
        }
    }

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>> {
        let state = self.lock().await?;
        Ok(state.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self, created_by: Option<&str>) -> StoreResult<Vec<Course>> {
        let state = self.lock().await?;
        Ok(state
            .courses
            .iter()
            .filter(|c| created_by.is_none_or(|owner| c.created_by == owner))
            .cloned()
            .collect())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.lessons.push(lesson.clone());
        Ok(())
    }

    async fn find_lesson(&self, id: &str) -> StoreResult<Option<Lesson>> {
        let state = self.lock().await?;
        Ok(state.lessons.iter().find(|l| l.id == id).cloned())
    }

    async fn list_lessons(&self, course_id: &str) -> StoreResult<Vec<Lesson>> {
        let state = self.lock().await?;
        let mut lessons: Vec<Lesson> = state
            .lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order_index);
        Ok(lessons)
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()> {
        let mut state = self.lock().await?;
        if state.enrollments.iter().any(|e| {
            e.learner_id == enrollment.learner_id && e.course_id == enrollment.course_id
        }) {
            return Err(StoreError::Conflict(
                "Already enrolled in this course".to_string(),
            ));
        }
        state.enrollments.push(enrollment.clone());
        Ok(())
    }

    async fn find_enrollment(&self, id: &str) -> StoreResult<Option<Enrollment>> {
        let state = self.lock().await?;
        Ok(state.enrollments.iter().find(|e| e.id == id).cloned())
    }

    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> StoreResult<()> {
        let mut state = self.lock().await?;
        match state.enrollments.iter_mut().find(|e| e.id == enrollment.id) {
            Some(existing) => {
                existing.progress_percent = enrollment.progress_percent;
                existing.status = enrollment.status;
                existing.updated_at = enrollment.updated_at;
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "Enrollment {} vanished",
                enrollment.id
            ))),
        }
    }

    async fn enrollments_for_learner(&self, learner_id: &str) -> StoreResult<Vec<Enrollment>> {
        let state = self.lock().await?;
        Ok(learner_enrollments(&state, learner_id))
    }

    async fn enrollments_for_courses(&self, course_ids: &[String]) -> StoreResult<Vec<Enrollment>> {
        let state = self.lock().await?;
        Ok(state
            .enrollments
            .iter()
            .filter(|e| course_ids.contains(&e.course_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_session(&self, session: &LearningSession) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.sessions.push(session.clone());
        Ok(())
    }

    async fn sessions_for_learner(&self, learner_id: &str) -> StoreResult<Vec<LearningSession>> {
        let state = self.lock().await?;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn count_quiz_attempts(&self, learner_id: &str, quiz_id: &str) -> StoreResult<u64> {
        let state = self.lock().await?;
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner_id && a.quiz_id == quiz_id)
            .count() as u64)
    }

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.attempts.push(attempt.clone());
        Ok(())
    }

    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> StoreResult<()> {
        let mut state = self.lock().await?;
        match state
            .lesson_progress
            .iter_mut()
            .find(|p| p.learner_id == progress.learner_id && p.lesson_id == progress.lesson_id)
        {
            Some(existing) => {
                existing.progress_percent = progress.progress_percent;
                existing.status = progress.status;
                existing.updated_at = progress.updated_at;
            }
            None => state.lesson_progress.push(progress.clone()),
        }
        Ok(())
    }

    async fn find_lesson_progress(
        &self,
        learner_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>> {
        let state = self.lock().await?;
        Ok(state
            .lesson_progress
            .iter()
            .find(|p| p.learner_id == learner_id && p.lesson_id == lesson_id)
            .cloned())
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.activity.push(entry.clone());
        Ok(())
    }

    async fn recent_activity(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        let state = self.lock().await?;
        // Reverse first so equal timestamps keep the later insert in front.
        let mut entries: Vec<ActivityLogEntry> = state
            .activity
            .iter()
            .rev()
            .filter(|entry| entry.learner_id == learner_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn recompute_snapshot(
        &self,
        learner_id: &str,
        derive: DeriveSnapshot<'_>,
    ) -> StoreResult<PerformanceSnapshot> {
        let mut state = self.lock().await?;

        let attempts: Vec<QuizAttempt> = state
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .cloned()
            .collect();
        let lesson_titles = state
            .lessons
            .iter()
            .filter(|lesson| attempts.iter().any(|a| a.quiz_id == lesson.id))
            .map(|lesson| (lesson.id.clone(), lesson.title.clone()))
            .collect();

        let inputs = AggregationInputs {
            sessions: state
                .sessions
                .iter()
                .filter(|s| s.learner_id == learner_id)
                .cloned()
                .collect(),
            attempts,
            enrollments: learner_enrollments(&state, learner_id),
            lesson_titles,
        };

        let snapshot = derive(&inputs);
        if self.snapshot_writes_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("snapshot write rejected".to_string()));
        }
        state
            .snapshots
            .insert(learner_id.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    async fn find_snapshot(&self, learner_id: &str) -> StoreResult<Option<PerformanceSnapshot>> {
        let state = self.lock().await?;
        Ok(state.snapshots.get(learner_id).cloned())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut state = self.lock().await?;
        state.conversations.push(conversation.clone());
        Ok(())
    }

    async fn count_conversations(&self, learner_id: &str) -> StoreResult<u64> {
        let state = self.lock().await?;
        Ok(state
            .conversations
            .iter()
            .filter(|c| c.learner_id == learner_id)
            .count() as u64)
    }
}

#[async_trait]
impl LearningStore for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().await.map(|_| ())
    }
}

fn learner_enrollments(state: &MemoryState, learner_id: &str) -> Vec<Enrollment> {
    let mut enrollments: Vec<Enrollment> = state
        .enrollments
        .iter()
        .filter(|e| e.learner_id == learner_id)
        .cloned()
        .collect();
    enrollments.sort_by_key(|e| e.enrolled_at);
    enrollments
}
