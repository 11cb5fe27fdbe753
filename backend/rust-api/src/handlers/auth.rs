use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    extractors::AppJson,
    models::user::{RegisterProfileRequest, RegisterProfileResponse, User, UserProfile},
    services::{identity_service::IdentityService, AppState},
};

/// GET /api/v1/auth/me
pub async fn get_current_user(Extension(user): Extension<User>) -> Json<UserProfile> {
    Json(user.into())
}

/// POST /api/v1/auth/register-profile
pub async fn register_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(req): AppJson<RegisterProfileRequest>,
) -> Result<Json<RegisterProfileResponse>, AppError> {
    let role = IdentityService::new(&state)
        .register_profile(&user, &req.role)
        .await?;
    Ok(Json(RegisterProfileResponse {
        message: "Profile configured",
        role,
    }))
}
