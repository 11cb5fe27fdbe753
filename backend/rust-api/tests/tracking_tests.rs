use axum::http::StatusCode;
use learnsphere_api::{
    models::user::Role,
    store::{EventStore, SnapshotStore},
};
use serde_json::{json, Value};

mod common;

use common::TestApp;

async fn submit(
    app: &TestApp,
    token: &str,
    course_id: &str,
    quiz_id: &str,
    score: i32,
) -> (StatusCode, Value) {
    app.post(
        "/api/v1/tracking/quiz/submit",
        token,
        json!({
            "course_id": course_id,
            "quiz_id": quiz_id,
            "score": score,
            "total_questions": 10,
            "time_taken_seconds": 300
        }),
    )
    .await
}

#[tokio::test]
async fn test_fresh_learner_gets_default_performance() {
    let app = TestApp::new();
    let (_, token) = app.user(Role::Learner, "ada").await;

    let (status, body) = app.get("/api/v1/tracking/performance/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total_learning_time"], 0);
    assert_eq!(body["average_score"], 0.0);
    assert_eq!(body["completion_percentage"], 0.0);
    assert_eq!(body["weak_topics"], json!([]));
    assert_eq!(body["engagement_level"], "low");
    assert_eq!(body["learning_trend"], "stable");
}

#[tokio::test]
async fn test_quiz_submissions_drive_weak_topics() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (_, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;

    let scores = [40, 90, 55, 30, 65];
    for (i, score) in scores.iter().enumerate() {
        let lesson = app.lesson(&course, &format!("L{}", i + 1), i as i32).await;
        let (status, body) = submit(&app, &token, &course.id, &lesson.id, *score).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempt_number"], 1);
    }

    let (_, perf) = app.get("/api/v1/tracking/performance/me", &token).await;
    let mut weak: Vec<&str> = perf["weak_topics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    weak.sort();
    assert_eq!(weak, vec!["L1", "L3", "L4"]);
    assert_eq!(perf["average_score"], 56.0);
}

#[tokio::test]
async fn test_retake_increments_attempt_number() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (_, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;
    let quiz = app.lesson(&course, "Quiz", 1).await;

    let (_, first) = submit(&app, &token, &course.id, &quiz.id, 20).await;
    let (_, second) = submit(&app, &token, &course.id, &quiz.id, 95).await;

    assert_eq!(first["attempt_number"], 1);
    assert_eq!(second["attempt_number"], 2);
    assert_eq!(second["score"], 95);
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (learner, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;
    let quiz = app.lesson(&course, "Quiz", 1).await;

    let (status, _) = submit(&app, &token, &course.id, &quiz.id, 120).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.store.count_quiz_attempts(&learner.id, &quiz.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_lesson_progress_and_course_start_are_logged() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (learner, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;
    let lesson = app.lesson(&course, "Intro", 1).await;

    let (status, body) = app
        .post(
            "/api/v1/tracking/course/start",
            &token,
            json!({ "course_id": course.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = app
        .post(
            "/api/v1/tracking/lesson/progress",
            &token,
            json!({ "course_id": course.id, "lesson_id": lesson.id, "percent": 45 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percent"], 45);
    assert_eq!(body["status"], "IN_PROGRESS");

    let activity = app.store.recent_activity(&learner.id, 3).await.unwrap();
    let kinds: Vec<&str> = activity.iter().map(|e| e.activity_type.as_str()).collect();
    assert_eq!(kinds, vec!["lesson_progress", "course_start"]);
}

#[tokio::test]
async fn test_sessions_accumulate_learning_time_and_engagement() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (_, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;

    for day in 1..=6 {
        let (status, body) = app
            .post(
                "/api/v1/tracking/session/end",
                &token,
                json!({
                    "course_id": course.id,
                    "started_at": format!("2026-03-{day:02}T09:00:00Z"),
                    "ended_at": format!("2026-03-{day:02}T09:10:00Z")
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duration"], 600);
    }

    let (_, perf) = app.get("/api/v1/tracking/performance/me", &token).await;
    assert_eq!(perf["total_learning_time"], 3600);
    assert_eq!(perf["engagement_level"], "medium");
}

#[tokio::test]
async fn test_tracking_unknown_course_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.user(Role::Learner, "ada").await;

    let (status, body) = app
        .post(
            "/api/v1/tracking/course/start",
            &token,
            json!({ "course_id": "missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_failed_recompute_reports_aggregation_error_and_keeps_snapshot() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (learner, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;
    let quiz = app.lesson(&course, "Quiz", 1).await;

    submit(&app, &token, &course.id, &quiz.id, 70).await;
    let before = app.store.find_snapshot(&learner.id).await.unwrap().unwrap();

    app.store.set_snapshot_writes_failing(true);
    let (status, body) = submit(&app, &token, &course.id, &quiz.id, 10).await;
    app.store.set_snapshot_writes_failing(false);

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Performance recomputation failed"));

    // The attempt itself was recorded before the recompute ran
    assert_eq!(
        app.store
            .count_quiz_attempts(&learner.id, &quiz.id)
            .await
            .unwrap(),
        2
    );
    let after = app.store.find_snapshot(&learner.id).await.unwrap().unwrap();
    assert_eq!(after, before);
}
