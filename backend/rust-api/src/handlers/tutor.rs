use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::{
        tutor::{ChatRequest, ChatResponse},
        user::User,
    },
    services::{tutor_service::TutorService, AppState},
};

/// POST /api/v1/ai/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    Ok(Json(TutorService::new(&state).ask(&user, req).await?))
}
