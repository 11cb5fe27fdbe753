use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    metrics::ACTIVITY_EVENTS_TOTAL,
    models::{
        course::clamp_percent,
        performance::PerformanceSnapshot,
        tracking::{
            ActivityLogEntry, ActivityType, LearningSession, LessonProgress,
            LessonProgressRequest, LessonProgressResponse, QuizAttempt, QuizSubmitRequest,
            QuizSubmitResponse, SessionEndRequest, SessionEndResponse, StartCourseRequest,
            TrackingAck,
        },
    },
    services::{performance_service::PerformanceRecomputer, AppState},
    store::LearningStore,
};

/// Writes learner activity and refreshes the learner's snapshot before returning.
pub struct TrackingService {
    store: Arc<dyn LearningStore>,
    recomputer: Arc<dyn PerformanceRecomputer>,
}

impl TrackingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            recomputer: state.recomputer.clone(),
        }
    }

    pub async fn start_course(
        &self,
        learner_id: &str,
        req: StartCourseRequest,
    ) -> Result<TrackingAck, AppError> {
        self.require_course(&req.course_id).await?;

        let entry = ActivityLogEntry::new(
            learner_id,
            ActivityType::CourseStart,
            format!("Started course {}", req.course_id),
        )
        .with_field("course_id", req.course_id.as_str());
        self.log(&entry).await?;

        tracing::info!("Learner {} started course {}", learner_id, req.course_id);
        Ok(TrackingAck { success: true })
    }

    pub async fn lesson_progress(
        &self,
        learner_id: &str,
        req: LessonProgressRequest,
    ) -> Result<LessonProgressResponse, AppError> {
        self.require_course(&req.course_id).await?;
        let lesson = self
            .store
            .find_lesson(&req.lesson_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lesson"))?;
        if lesson.course_id != req.course_id {
            return Err(AppError::validation("Lesson does not belong to this course"));
        }

        let percent = clamp_percent(req.percent);
        let progress = LessonProgress::new(learner_id, &req.lesson_id, percent);
        self.store.upsert_lesson_progress(&progress).await?;

        let entry = ActivityLogEntry::new(
            learner_id,
            ActivityType::LessonProgress,
            format!("Updated progress on lesson {} to {}%", req.lesson_id, percent),
        )
        .with_field("course_id", req.course_id.as_str())
        .with_field("lesson_id", req.lesson_id.as_str());
        self.log(&entry).await?;

        tracing::info!(
            "Learner {} progress on lesson {} set to {}%",
            learner_id,
            req.lesson_id,
            percent
        );

        self.recomputer.recompute(learner_id).await?;

        Ok(LessonProgressResponse {
            success: true,
            percent,
            status: progress.status,
        })
    }

    pub async fn submit_quiz(
        &self,
        learner_id: &str,
        req: QuizSubmitRequest,
    ) -> Result<QuizSubmitResponse, AppError> {
        req.validate()?;
        self.require_course(&req.course_id).await?;

        let prior = self.store.count_quiz_attempts(learner_id, &req.quiz_id).await?;
        let attempt = QuizAttempt {
            id: crate::models::new_id(),
            learner_id: learner_id.to_string(),
            course_id: req.course_id.clone(),
            quiz_id: req.quiz_id.clone(),
            score: req.score,
            total_questions: req.total_questions,
            time_taken_seconds: req.time_taken_seconds,
            attempt_number: i32::try_from(prior + 1).unwrap_or(i32::MAX),
            created_at: Utc::now(),
        };
        self.store.insert_quiz_attempt(&attempt).await?;

        let entry = ActivityLogEntry::new(
            learner_id,
            ActivityType::QuizSubmitted,
            format!(
                "Submitted quiz {} inside course {} with score {}/{}",
                req.quiz_id, req.course_id, req.score, req.total_questions
            ),
        )
        .with_field("course_id", req.course_id.as_str())
        .with_field("quiz_id", req.quiz_id.as_str())
        .with_field("score", req.score);
        self.log(&entry).await?;

        tracing::info!(
            "Learner {} submitted quiz {} (attempt {}, score {})",
            learner_id,
            req.quiz_id,
            attempt.attempt_number,
            req.score
        );

        self.recomputer.recompute(learner_id).await?;

        Ok(QuizSubmitResponse {
            success: true,
            score: attempt.score,
            attempt_number: attempt.attempt_number,
        })
    }

    pub async fn end_session(
        &self,
        learner_id: &str,
        req: SessionEndRequest,
    ) -> Result<SessionEndResponse, AppError> {
        self.require_course(&req.course_id).await?;

        let session = LearningSession::new(
            learner_id,
            &req.course_id,
            req.lesson_id.clone(),
            req.started_at,
            req.ended_at,
        );
        self.store.insert_session(&session).await?;

        let entry = ActivityLogEntry::new(
            learner_id,
            ActivityType::SessionEnded,
            format!(
                "Ended session for course {} duration {}s",
                req.course_id, session.duration_seconds
            ),
        )
        .with_field("course_id", req.course_id.as_str())
        .with_field("lesson_id", req.lesson_id.clone());
        self.log(&entry).await?;

        tracing::info!(
            "Learner {} ended session on course {} ({}s)",
            learner_id,
            req.course_id,
            session.duration_seconds
        );

        self.recomputer.recompute(learner_id).await?;

        Ok(SessionEndResponse {
            success: true,
            duration: session.duration_seconds,
        })
    }

    pub async fn my_performance(&self, learner_id: &str) -> Result<PerformanceSnapshot, AppError> {
        self.recomputer.current(learner_id).await
    }

    async fn require_course(&self, course_id: &str) -> Result<(), AppError> {
        match self.store.find_course(course_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("Course")),
        }
    }

    async fn log(&self, entry: &ActivityLogEntry) -> Result<(), AppError> {
        self.store.append_activity(entry).await?;
        ACTIVITY_EVENTS_TOTAL
            .with_label_values(&[entry.activity_type.as_str()])
            .inc();
        Ok(())
    }
}
