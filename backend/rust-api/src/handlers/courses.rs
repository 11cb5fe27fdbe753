use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::{
        course::{
            CourseResponse, CreateCourseRequest, CreateLessonRequest, EnrolledCourse,
            EnrollmentResponse, LessonResponse,
        },
        user::User,
    },
    services::{course_service::CourseService, enrollment_service::EnrollmentService, AppState},
};

pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), AppError> {
    let course = CourseService::new(&state).create_course(&user, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = CourseService::new(&state)
        .update_course(&user, &course_id, req)
        .await?;
    Ok(Json(course))
}

pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseResponse>, AppError> {
    Ok(Json(CourseService::new(&state).get_course(&course_id).await?))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    Ok(Json(CourseService::new(&state).list_courses().await?))
}

pub async fn my_courses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<EnrolledCourse>>, AppError> {
    Ok(Json(CourseService::new(&state).my_courses(&user).await?))
}

pub async fn add_lesson(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<CreateLessonRequest>,
) -> Result<(StatusCode, Json<LessonResponse>), AppError> {
    let lesson = CourseService::new(&state)
        .add_lesson(&user, &course_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<LessonResponse>>, AppError> {
    Ok(Json(CourseService::new(&state).list_lessons(&course_id).await?))
}

pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(course_id): Path<String>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), AppError> {
    let enrollment = EnrollmentService::new(&state).enroll(&user, &course_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}
