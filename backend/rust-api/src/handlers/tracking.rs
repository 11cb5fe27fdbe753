use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::{
        performance::PerformanceResponse,
        tracking::{
            LessonProgressRequest, LessonProgressResponse, QuizSubmitRequest,
            QuizSubmitResponse, SessionEndRequest, SessionEndResponse, StartCourseRequest,
            TrackingAck,
        },
        user::User,
    },
    services::{
        access_policy::{authorize, Action},
        tracking_service::TrackingService,
        AppState,
    },
};

pub async fn start_course(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<StartCourseRequest>,
) -> Result<Json<TrackingAck>, AppError> {
    authorize(&user, Action::TrackActivity)?;
    Ok(Json(
        TrackingService::new(&state)
            .start_course(&user.id, req)
            .await?,
    ))
}

pub async fn lesson_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<LessonProgressRequest>,
) -> Result<Json<LessonProgressResponse>, AppError> {
    authorize(&user, Action::TrackActivity)?;
    Ok(Json(
        TrackingService::new(&state)
            .lesson_progress(&user.id, req)
            .await?,
    ))
}

pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<QuizSubmitRequest>,
) -> Result<Json<QuizSubmitResponse>, AppError> {
    authorize(&user, Action::TrackActivity)?;
    Ok(Json(
        TrackingService::new(&state)
            .submit_quiz(&user.id, req)
            .await?,
    ))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<SessionEndRequest>,
) -> Result<Json<SessionEndResponse>, AppError> {
    authorize(&user, Action::TrackActivity)?;
    Ok(Json(
        TrackingService::new(&state)
            .end_session(&user.id, req)
            .await?,
    ))
}

pub async fn my_performance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<PerformanceResponse>, AppError> {
    authorize(&user, Action::ViewOwnPerformance)?;
    let snapshot = TrackingService::new(&state).my_performance(&user.id).await?;
    Ok(Json(snapshot.into()))
}
