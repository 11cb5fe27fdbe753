use std::{collections::HashMap, sync::Arc};

use crate::{
    error::AppError,
    models::{
        course::{Course, Enrollment, ProgressStatus},
        dashboard::{DashboardMetrics, LearnerProgressRow},
        user::{Role, User},
    },
    services::{
        access_policy::{authorize, Action},
        AppState,
    },
    store::LearningStore,
};

/// Staff view over enrollments: all courses for admins, own courses for instructors.
pub struct DashboardService {
    store: Arc<dyn LearningStore>,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn metrics(&self, user: &User) -> Result<DashboardMetrics, AppError> {
        authorize(user, Action::ViewDashboard)?;
        let (_, enrollments) = self.visible_enrollments(user).await?;
        Ok(count_statuses(&enrollments))
    }

    pub async fn learner_progress(&self, user: &User) -> Result<Vec<LearnerProgressRow>, AppError> {
        authorize(user, Action::ViewDashboard)?;
        let (courses, enrollments) = self.visible_enrollments(user).await?;

        let titles: HashMap<&str, &str> = courses
            .iter()
            .map(|c| (c.id.as_str(), c.title.as_str()))
            .collect();

        let mut rows = Vec::with_capacity(enrollments.len());
        for enrollment in &enrollments {
            let Some(course_name) = titles.get(enrollment.course_id.as_str()) else {
                continue;
            };
            let Some(learner) = self.store.find_user(&enrollment.learner_id).await? else {
                continue;
            };

            let time_spent_seconds = self
                .store
                .sessions_for_learner(&learner.id)
                .await?
                .iter()
                .filter(|s| s.course_id == enrollment.course_id)
                .map(|s| s.duration_seconds)
                .sum();

            rows.push(LearnerProgressRow {
                course_name: course_name.to_string(),
                learner_name: learner.display_name().to_string(),
                learner_email: learner.email.clone(),
                enrolled_date: enrollment.enrolled_at,
                completion_percentage: enrollment.progress_percent,
                status: enrollment.status.label(),
                time_spent_seconds,
            });
        }
        Ok(rows)
    }

    async fn visible_enrollments(
        &self,
        user: &User,
    ) -> Result<(Vec<Course>, Vec<Enrollment>), AppError> {
        let owner = match user.role {
            Role::Admin => None,
            _ => Some(user.id.as_str()),
        };
        let courses = self.store.list_courses(owner).await?;
        let course_ids: Vec<String> = courses.iter().map(|c| c.id.clone()).collect();
        let enrollments = self.store.enrollments_for_courses(&course_ids).await?;
        Ok((courses, enrollments))
    }
}

fn count_statuses(enrollments: &[Enrollment]) -> DashboardMetrics {
    enrollments
        .iter()
        .fold(DashboardMetrics::default(), |mut metrics, enrollment| {
            metrics.total_participants += 1;
            match enrollment.status {
                ProgressStatus::NotStarted => metrics.yet_to_start += 1,
                ProgressStatus::InProgress => metrics.in_progress += 1,
                ProgressStatus::Completed => metrics.completed += 1,
            }
            metrics
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_count_statuses() {
        let mut started = Enrollment::new("a", "c");
        started.apply_progress(50, Utc::now());
        let mut done = Enrollment::new("b", "c");
        done.apply_progress(100, Utc::now());
        let fresh = Enrollment::new("c", "c");

        assert_eq!(
            count_statuses(&[started, done, fresh]),
            DashboardMetrics {
                total_participants: 3,
                yet_to_start: 1,
                in_progress: 1,
                completed: 1,
            }
        );
    }
}
