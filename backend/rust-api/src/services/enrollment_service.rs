use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        course::{Enrollment, EnrollmentResponse, UpdateProgressRequest},
        user::User,
    },
    services::{
        access_policy::{authorize, Action},
        performance_service::PerformanceRecomputer,
        AppState,
    },
    store::LearningStore,
};

pub struct EnrollmentService {
    store: Arc<dyn LearningStore>,
    recomputer: Arc<dyn PerformanceRecomputer>,
}

impl EnrollmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            recomputer: state.recomputer.clone(),
        }
    }

    /// Creates a NOT_STARTED enrollment; a second enroll into the same course
    /// is a conflict and writes nothing.
    pub async fn enroll(
        &self,
        user: &User,
        course_id: &str,
    ) -> Result<EnrollmentResponse, AppError> {
        authorize(user, Action::Enroll)?;
        if self.store.find_course(course_id).await?.is_none() {
            return Err(AppError::not_found("Course"));
        }

        let enrollment = Enrollment::new(&user.id, course_id);
        self.store.insert_enrollment(&enrollment).await?;

        tracing::info!("Learner {} enrolled in course {}", user.id, course_id);
        Ok(EnrollmentResponse::from(&enrollment))
    }

    pub async fn update_progress(
        &self,
        user: &User,
        enrollment_id: &str,
        req: UpdateProgressRequest,
    ) -> Result<EnrollmentResponse, AppError> {
        let mut enrollment = self
            .store
            .find_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Enrollment"))?;
        authorize(
            user,
            Action::UpdateOwnEnrollment {
                owner: &enrollment.learner_id,
            },
        )?;

        enrollment.apply_progress(req.progress_percent, Utc::now());
        self.store.save_enrollment_progress(&enrollment).await?;

        tracing::info!(
            "Enrollment {} progress set to {}% ({})",
            enrollment.id,
            enrollment.progress_percent,
            enrollment.status.as_str()
        );

        self.recomputer.recompute(&enrollment.learner_id).await?;

        Ok(EnrollmentResponse::from(&enrollment))
    }
}
