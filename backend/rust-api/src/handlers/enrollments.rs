use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::{
        course::{EnrollmentResponse, UpdateProgressRequest},
        user::User,
    },
    services::{enrollment_service::EnrollmentService, AppState},
};

/// PATCH /api/v1/enrollments/{id}/progress
pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(enrollment_id): Path<String>,
    AppJson(req): AppJson<UpdateProgressRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    let enrollment = EnrollmentService::new(&state)
        .update_progress(&user, &enrollment_id, req)
        .await?;
    Ok(Json(enrollment))
}
