use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::AppError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Public endpoints
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Everything under /api/v1 requires a bearer token
        .nest(
            "/api/v1",
            api_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(handlers::auth::get_current_user))
        .route("/auth/register-profile", post(handlers::auth::register_profile))
        .merge(course_routes())
        .route(
            "/enrollments/{id}/progress",
            patch(handlers::enrollments::update_progress),
        )
        .nest("/tracking", tracking_routes())
        .route("/dashboard/metrics", get(handlers::dashboard::get_metrics))
        .route(
            "/dashboard/learner-progress",
            get(handlers::dashboard::get_learner_progress),
        )
        .route("/ai/chat", post(handlers::tutor::chat))
}

fn course_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/courses",
            get(handlers::courses::list_courses).post(handlers::courses::create_course),
        )
        .route("/courses/my-courses", get(handlers::courses::my_courses))
        .route(
            "/courses/{id}",
            get(handlers::courses::get_course).put(handlers::courses::update_course),
        )
        .route(
            "/courses/{id}/lessons",
            get(handlers::courses::list_lessons).post(handlers::courses::add_lesson),
        )
        .route("/courses/{id}/enroll", post(handlers::courses::enroll))
}

fn tracking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/course/start", post(handlers::tracking::start_course))
        .route("/lesson/progress", post(handlers::tracking::lesson_progress))
        .route("/quiz/submit", post(handlers::tracking::submit_quiz))
        .route("/session/end", post(handlers::tracking::end_session))
        .route("/performance/me", get(handlers::tracking::my_performance))
}
