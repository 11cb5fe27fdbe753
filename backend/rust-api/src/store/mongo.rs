use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, ClientSession, Collection, Database, IndexModel,
};

use super::{
    AggregationInputs, CatalogStore, ConversationStore, DeriveSnapshot, EventStore,
    LearningStore, SnapshotStore, StoreError, StoreResult,
};
use crate::{
    metrics::track_store_operation,
    models::{
        course::{Course, Enrollment, Lesson},
        performance::PerformanceSnapshot,
        tracking::{ActivityLogEntry, LearningSession, LessonProgress, QuizAttempt},
        tutor::Conversation,
        user::{Role, User},
    },
};

const DUPLICATE_KEY_CODE: i32 = 11000;

const USERS: &str = "users";
const COURSES: &str = "courses";
const LESSONS: &str = "lessons";
const ENROLLMENTS: &str = "enrollments";
const LEARNING_SESSIONS: &str = "learning_sessions";
const QUIZ_ATTEMPTS: &str = "quiz_attempts";
const LESSON_PROGRESS: &str = "lesson_progress";
const ACTIVITY_LOG: &str = "activity_log";
const PERFORMANCE_SNAPSHOTS: &str = "performance_snapshots";
const AI_CONVERSATIONS: &str = "ai_conversations";

impl From<MongoError> for StoreError {
    fn from(err: MongoError) -> Self {
        if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
            if write_error.code == DUPLICATE_KEY_CODE {
                return StoreError::Conflict(write_error.message.clone());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

fn to_bson_datetime(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

/// MongoDB-backed store.
///
/// Snapshot recomputation runs inside a multi-document transaction, so the
/// deployment must be a replica set (a single-node replica set is enough).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        tracing::info!("Connected to MongoDB database {}", database);
        Ok(Self { client, db })
    }

    /// Creates the unique indexes the store's conflict semantics rely on.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "subject": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.enrollments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "course_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.lesson_progress()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "lesson_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.activity()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "created_at": -1 })
                    .build(),
            )
            .await?;
        self.quiz_attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "learner_id": 1, "quiz_id": 1 })
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn courses(&self) -> Collection<Course> {
        self.db.collection(COURSES)
    }

    fn lessons(&self) -> Collection<Lesson> {
        self.db.collection(LESSONS)
    }

    fn enrollments(&self) -> Collection<Enrollment> {
        self.db.collection(ENROLLMENTS)
    }

    fn sessions(&self) -> Collection<LearningSession> {
        self.db.collection(LEARNING_SESSIONS)
    }

    fn quiz_attempts(&self) -> Collection<QuizAttempt> {
        self.db.collection(QUIZ_ATTEMPTS)
    }

    fn lesson_progress(&self) -> Collection<LessonProgress> {
        self.db.collection(LESSON_PROGRESS)
    }

    fn activity(&self) -> Collection<ActivityLogEntry> {
        self.db.collection(ACTIVITY_LOG)
    }

    fn snapshots(&self) -> Collection<PerformanceSnapshot> {
        self.db.collection(PERFORMANCE_SNAPSHOTS)
    }

    fn conversations(&self) -> Collection<Conversation> {
        self.db.collection(AI_CONVERSATIONS)
    }

    async fn read_aggregation_inputs(
        &self,
        session: &mut ClientSession,
        learner_id: &str,
    ) -> StoreResult<AggregationInputs> {
        let sessions: Vec<LearningSession> = self
            .sessions()
            .find(doc! { "learner_id": learner_id })
            .session(&mut *session)
            .await?
            .stream(&mut *session)
            .try_collect()
            .await?;

        let attempts: Vec<QuizAttempt> = self
            .quiz_attempts()
            .find(doc! { "learner_id": learner_id })
            .session(&mut *session)
            .await?
            .stream(&mut *session)
            .try_collect()
            .await?;

        let enrollments: Vec<Enrollment> = self
            .enrollments()
            .find(doc! { "learner_id": learner_id })
            .sort(doc! { "enrolled_at": 1 })
            .session(&mut *session)
            .await?
            .stream(&mut *session)
            .try_collect()
            .await?;

        let mut quiz_ids: Vec<String> = attempts.iter().map(|a| a.quiz_id.clone()).collect();
        quiz_ids.sort();
        quiz_ids.dedup();

        let lessons: Vec<Lesson> = if quiz_ids.is_empty() {
            Vec::new()
        } else {
            self.lessons()
                .find(doc! { "_id": { "$in": quiz_ids } })
                .session(&mut *session)
                .await?
                .stream(&mut *session)
                .try_collect()
                .await?
        };

        Ok(AggregationInputs {
            sessions,
            attempts,
            enrollments,
            lesson_titles: lessons
                .into_iter()
                .map(|lesson| (lesson.id, lesson.title))
                .collect(),
        })
    }

    async fn recompute_in_transaction(
        &self,
        session: &mut ClientSession,
        learner_id: &str,
        derive: DeriveSnapshot<'_>,
    ) -> StoreResult<PerformanceSnapshot> {
        let inputs = self.read_aggregation_inputs(session, learner_id).await?;
        let snapshot = derive(&inputs);

        self.snapshots()
            .replace_one(doc! { "_id": learner_id }, &snapshot)
            .upsert(true)
            .session(&mut *session)
            .await?;

        Ok(snapshot)
    }
}

#[async_trait]
impl CatalogStore for MongoStore {
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        track_store_operation("find_user", async {
            Ok(self.users().find_one(doc! { "_id": id }).await?)
        })
        .await
    }

    async fn find_user_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        track_store_operation("find_user_by_subject", async {
            Ok(self.users().find_one(doc! { "subject": subject }).await?)
        })
        .await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        track_store_operation("insert_user", async {
            self.users().insert_one(user).await?;
            Ok(())
        })
        .await
    }

    async fn update_user_role(&self, id: &str, role: Role) -> StoreResult<()> {
        track_store_operation("update_user_role", async {
            self.users()
                .update_one(
                    doc! { "_id": id },
                    doc! { "$set": { "role": role.as_str() } },
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        track_store_operation("insert_course", async {
            self.courses().insert_one(course).await?;
            Ok(())
        })
        .await
    }

    async fn update_course(&self, course: &Course) -> StoreResult<()> {
        track_store_operation("update_course", async {
            self.courses()
                .replace_one(doc! { "_id": &course.id }, course)
                .await?;
            Ok(())
        })
        .await
    }

    async fn find_course(&self, id: &str) -> StoreResult<Option<Course>> {
        track_store_operation("find_course", async {
            Ok(self.courses().find_one(doc! { "_id": id }).await?)
        })
        .await
    }

    async fn list_courses(&self, created_by: Option<&str>) -> StoreResult<Vec<Course>> {
        track_store_operation("list_courses", async {
            let filter = match created_by {
                Some(owner) => doc! { "created_by": owner },
                None => doc! {},
            };
            let cursor = self
                .courses()
                .find(filter)
                .sort(doc! { "created_at": 1 })
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        track_store_operation("insert_lesson", async {
            self.lessons().insert_one(lesson).await?;
            Ok(())
        })
        .await
    }

    async fn find_lesson(&self, id: &str) -> StoreResult<Option<Lesson>> {
        track_store_operation("find_lesson", async {
            Ok(self.lessons().find_one(doc! { "_id": id }).await?)
        })
        .await
    }

    async fn list_lessons(&self, course_id: &str) -> StoreResult<Vec<Lesson>> {
        track_store_operation("list_lessons", async {
            let cursor = self
                .lessons()
                .find(doc! { "course_id": course_id })
                .sort(doc! { "order_index": 1 })
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()> {
        track_store_operation("insert_enrollment", async {
            self.enrollments().insert_one(enrollment).await?;
            Ok(())
        })
        .await
    }

    async fn find_enrollment(&self, id: &str) -> StoreResult<Option<Enrollment>> {
        track_store_operation("find_enrollment", async {
            Ok(self.enrollments().find_one(doc! { "_id": id }).await?)
        })
        .await
    }

    async fn save_enrollment_progress(&self, enrollment: &Enrollment) -> StoreResult<()> {
        track_store_operation("save_enrollment_progress", async {
            self.enrollments()
                .update_one(
                    doc! { "_id": &enrollment.id },
                    doc! {
                        "$set": {
                            "progress_percent": enrollment.progress_percent,
                            "status": enrollment.status.as_str(),
                            "updated_at": to_bson_datetime(enrollment.updated_at),
                        }
                    },
                )
                .await?;
            Ok(())
        })
        .await
    }

    async fn enrollments_for_learner(&self, learner_id: &str) -> StoreResult<Vec<Enrollment>> {
        track_store_operation("enrollments_for_learner", async {
            let cursor = self
                .enrollments()
                .find(doc! { "learner_id": learner_id })
                .sort(doc! { "enrolled_at": 1 })
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }

    async fn enrollments_for_courses(&self, course_ids: &[String]) -> StoreResult<Vec<Enrollment>> {
        track_store_operation("enrollments_for_courses", async {
            if course_ids.is_empty() {
                return Ok(Vec::new());
            }
            let cursor = self
                .enrollments()
                .find(doc! { "course_id": { "$in": course_ids.to_vec() } })
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }
}

#[async_trait]
impl EventStore for MongoStore {
    async fn insert_session(&self, session: &LearningSession) -> StoreResult<()> {
        track_store_operation("insert_session", async {
            self.sessions().insert_one(session).await?;
            Ok(())
        })
        .await
    }

    async fn sessions_for_learner(&self, learner_id: &str) -> StoreResult<Vec<LearningSession>> {
        track_store_operation("sessions_for_learner", async {
            let cursor = self
                .sessions()
                .find(doc! { "learner_id": learner_id })
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }

    async fn count_quiz_attempts(&self, learner_id: &str, quiz_id: &str) -> StoreResult<u64> {
        track_store_operation("count_quiz_attempts", async {
            Ok(self
                .quiz_attempts()
                .count_documents(doc! { "learner_id": learner_id, "quiz_id": quiz_id })
                .await?)
        })
        .await
    }

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        track_store_operation("insert_quiz_attempt", async {
            self.quiz_attempts().insert_one(attempt).await?;
            Ok(())
        })
        .await
    }

    async fn upsert_lesson_progress(&self, progress: &LessonProgress) -> StoreResult<()> {
        track_store_operation("upsert_lesson_progress", async {
            self.lesson_progress()
                .update_one(
                    doc! {
                        "learner_id": &progress.learner_id,
                        "lesson_id": &progress.lesson_id,
                    },
                    doc! {
                        "$set": {
                            "progress_percent": progress.progress_percent,
                            "status": progress.status.as_str(),
                            "updated_at": to_bson_datetime(progress.updated_at),
                        },
                        "$setOnInsert": { "_id": &progress.id },
                    },
                )
                .upsert(true)
                .await?;
            Ok(())
        })
        .await
    }

    async fn find_lesson_progress(
        &self,
        learner_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonProgress>> {
        track_store_operation("find_lesson_progress", async {
            Ok(self
                .lesson_progress()
                .find_one(doc! { "learner_id": learner_id, "lesson_id": lesson_id })
                .await?)
        })
        .await
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        track_store_operation("append_activity", async {
            self.activity().insert_one(entry).await?;
            Ok(())
        })
        .await
    }

    async fn recent_activity(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        track_store_operation("recent_activity", async {
            let cursor = self
                .activity()
                .find(doc! { "learner_id": learner_id })
                .sort(doc! { "created_at": -1 })
                .limit(limit as i64)
                .await?;
            Ok(cursor.try_collect().await?)
        })
        .await
    }
}

#[async_trait]
impl SnapshotStore for MongoStore {
    async fn recompute_snapshot(
        &self,
        learner_id: &str,
        derive: DeriveSnapshot<'_>,
    ) -> StoreResult<PerformanceSnapshot> {
        track_store_operation("recompute_snapshot", async {
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            match self
                .recompute_in_transaction(&mut session, learner_id, derive)
                .await
            {
                Ok(snapshot) => {
                    session.commit_transaction().await?;
                    Ok(snapshot)
                }
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        tracing::warn!(
                            "Failed to abort snapshot transaction for {}: {}",
                            learner_id,
                            abort_err
                        );
                    }
                    Err(err)
                }
            }
        })
        .await
    }

    async fn find_snapshot(&self, learner_id: &str) -> StoreResult<Option<PerformanceSnapshot>> {
        track_store_operation("find_snapshot", async {
            Ok(self.snapshots().find_one(doc! { "_id": learner_id }).await?)
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for MongoStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        track_store_operation("insert_conversation", async {
            self.conversations().insert_one(conversation).await?;
            Ok(())
        })
        .await
    }

    async fn count_conversations(&self, learner_id: &str) -> StoreResult<u64> {
        track_store_operation("count_conversations", async {
            Ok(self
                .conversations()
                .count_documents(doc! { "learner_id": learner_id })
                .await?)
        })
        .await
    }
}

#[async_trait]
impl LearningStore for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        track_store_operation("ping", async {
            self.db.run_command(doc! { "ping": 1 }).await?;
            Ok(())
        })
        .await
    }
}
