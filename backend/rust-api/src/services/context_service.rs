use std::{collections::HashMap, sync::Arc};

use crate::{
    error::AppError,
    models::tutor::{CourseContext, PerformanceContext, TutorContext},
    store::LearningStore,
    services::AppState,
};

pub const RECENT_ACTIVITY_LIMIT: usize = 3;

/// Projects a learner's enrollments, snapshot and latest activity into the
/// bounded summary embedded in tutor prompts. Read-only.
pub struct ContextBuilder {
    store: Arc<dyn LearningStore>,
}

impl ContextBuilder {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn build(&self, learner_id: &str) -> Result<TutorContext, AppError> {
        let enrollments = self.store.enrollments_for_learner(learner_id).await?;

        let mut titles = HashMap::new();
        for enrollment in &enrollments {
            if titles.contains_key(&enrollment.course_id) {
                continue;
            }
            if let Some(course) = self.store.find_course(&enrollment.course_id).await? {
                titles.insert(course.id, course.title);
            }
        }

        // Enrollments whose course is gone are skipped
        let courses = enrollments
            .iter()
            .filter_map(|enrollment| {
                titles.get(&enrollment.course_id).map(|name| CourseContext {
                    name: name.clone(),
                    completion: f64::from(enrollment.progress_percent),
                })
            })
            .collect();

        let performance = match self.store.find_snapshot(learner_id).await? {
            Some(snapshot) => PerformanceContext::from(&snapshot.metrics),
            None => PerformanceContext::unknown(),
        };

        let recent_activity = self
            .store
            .recent_activity(learner_id, RECENT_ACTIVITY_LIMIT)
            .await?
            .iter()
            .map(|entry| entry.summary())
            .collect();

        Ok(TutorContext {
            courses,
            performance,
            recent_activity,
        })
    }
}
