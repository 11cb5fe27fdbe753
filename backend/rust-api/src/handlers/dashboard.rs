use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::{
    error::AppError,
    models::{
        dashboard::{DashboardMetrics, LearnerProgressRow},
        user::User,
    },
    services::{dashboard_service::DashboardService, AppState},
};

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<DashboardMetrics>, AppError> {
    Ok(Json(DashboardService::new(&state).metrics(&user).await?))
}

pub async fn get_learner_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<LearnerProgressRow>>, AppError> {
    Ok(Json(
        DashboardService::new(&state).learner_progress(&user).await?,
    ))
}
