use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{
            Course, CourseResponse, CreateCourseRequest, CreateLessonRequest, EnrolledCourse,
            Lesson, LessonResponse,
        },
        user::User,
    },
    services::{
        access_policy::{authorize, Action},
        AppState,
    },
    store::LearningStore,
};

pub struct CourseService {
    store: Arc<dyn LearningStore>,
}

impl CourseService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn create_course(
        &self,
        user: &User,
        req: CreateCourseRequest,
    ) -> Result<CourseResponse, AppError> {
        authorize(user, Action::CreateCourse)?;
        let req = req.trimmed();
        req.validate()?;

        let course = Course {
            id: crate::models::new_id(),
            title: req.title,
            description: req.description,
            created_by: user.id.clone(),
            created_at: Utc::now(),
        };
        self.store.insert_course(&course).await?;

        tracing::info!("Course {} created by {}", course.id, user.id);
        Ok(course.into())
    }

    pub async fn update_course(
        &self,
        user: &User,
        course_id: &str,
        req: CreateCourseRequest,
    ) -> Result<CourseResponse, AppError> {
        let req = req.trimmed();
        req.validate()?;
        let mut course = self.load(course_id).await?;
        authorize(
            user,
            Action::ManageCourse {
                owner: &course.created_by,
            },
        )?;

        course.title = req.title;
        course.description = req.description;
        self.store.update_course(&course).await?;

        tracing::info!("Course {} updated by {}", course.id, user.id);
        Ok(course.into())
    }

    pub async fn get_course(&self, course_id: &str) -> Result<CourseResponse, AppError> {
        Ok(self.load(course_id).await?.into())
    }

    pub async fn list_courses(&self) -> Result<Vec<CourseResponse>, AppError> {
        let courses = self.store.list_courses(None).await?;
        Ok(courses.into_iter().map(CourseResponse::from).collect())
    }

    pub async fn add_lesson(
        &self,
        user: &User,
        course_id: &str,
        req: CreateLessonRequest,
    ) -> Result<LessonResponse, AppError> {
        let req = req.trimmed();
        req.validate()?;
        let course = self.load(course_id).await?;
        authorize(
            user,
            Action::ManageCourse {
                owner: &course.created_by,
            },
        )?;

        let lesson = Lesson {
            id: crate::models::new_id(),
            course_id: course.id,
            title: req.title,
            kind: req.kind,
            duration_minutes: req.duration_minutes,
            order_index: req.order_index,
        };
        self.store.insert_lesson(&lesson).await?;

        tracing::info!("Lesson {} added to course {}", lesson.id, lesson.course_id);
        Ok(lesson.into())
    }

    pub async fn list_lessons(&self, course_id: &str) -> Result<Vec<LessonResponse>, AppError> {
        self.load(course_id).await?;
        let lessons = self.store.list_lessons(course_id).await?;
        Ok(lessons.into_iter().map(LessonResponse::from).collect())
    }

    /// The learner's enrollments joined with course details.
    pub async fn my_courses(&self, user: &User) -> Result<Vec<EnrolledCourse>, AppError> {
        authorize(user, Action::ListOwnCourses)?;

        let enrollments = self.store.enrollments_for_learner(&user.id).await?;
        let mut result = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let Some(course) = self.store.find_course(&enrollment.course_id).await? else {
                continue;
            };
            result.push(EnrolledCourse {
                course_id: course.id,
                course_name: course.title,
                description: course.description,
                enrollment_id: enrollment.id,
                progress_percent: enrollment.progress_percent,
                status: enrollment.status,
            });
        }
        Ok(result)
    }

    async fn load(&self, course_id: &str) -> Result<Course, AppError> {
        self.store
            .find_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course"))
    }
}
