use axum::http::StatusCode;
use learnsphere_api::{
    models::user::Role,
    services::text_generation::UpstreamError,
    store::ConversationStore,
};
use serde_json::json;

mod common;

use common::{Script, TestApp};

#[tokio::test]
async fn test_answer_is_returned_and_conversation_stored() {
    let app = TestApp::new();
    let (instructor, _) = app.user(Role::Instructor, "ines").await;
    let (learner, token) = app.user(Role::Learner, "ada").await;
    let course = app.course(&instructor, "Algebra").await;
    app.post(
        &format!("/api/v1/courses/{}/enroll", course.id),
        &token,
        json!({}),
    )
    .await;
    app.generator
        .set(Script::Reply("Review fractions for 20 minutes daily.".to_string()));

    let (status, body) = app
        .post(
            "/api/v1/ai/chat",
            &token,
            json!({ "prompt": "What should I study next?" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Review fractions for 20 minutes daily.");
    assert_eq!(app.store.count_conversations(&learner.id).await.unwrap(), 1);

    let prompt = app.generator.last_prompt().unwrap();
    assert!(prompt.contains("User Role: learner"));
    assert!(prompt.contains("\"name\": \"Algebra\""));
    assert!(prompt.ends_with("User Question: What should I study next?"));
}

#[tokio::test]
async fn test_prompt_length_is_validated_before_generation() {
    let app = TestApp::new();
    let (learner, token) = app.user(Role::Learner, "ada").await;

    for prompt in [String::new(), "x".repeat(1001)] {
        let (status, body) = app
            .post("/api/v1/ai/chat", &token, json!({ "prompt": prompt }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    assert_eq!(app.generator.calls(), 0);
    assert_eq!(app.store.count_conversations(&learner.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upstream_failure_leaves_no_conversation() {
    let app = TestApp::new();
    let (learner, token) = app.user(Role::Learner, "ada").await;
    app.generator.set(Script::Fail(UpstreamError::Status {
        status: 502,
        body: "bad gateway".to_string(),
    }));

    let before = app.store.count_conversations(&learner.id).await.unwrap();
    let (status, body) = app
        .post("/api/v1/ai/chat", &token, json!({ "prompt": "Help me" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
    assert_eq!(app.generator.calls(), 1);
    assert_eq!(
        app.store.count_conversations(&learner.id).await.unwrap(),
        before
    );
}

#[tokio::test]
async fn test_slow_generator_times_out() {
    let app = TestApp::with_config(|config| config.text_generation.timeout_secs = 1);
    let (learner, token) = app.user(Role::Learner, "ada").await;
    app.generator.set(Script::Hang);

    let (status, body) = app
        .post("/api/v1/ai/chat", &token, json!({ "prompt": "Are you there?" }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].as_str().unwrap().contains("timed out"));
    assert_eq!(app.store.count_conversations(&learner.id).await.unwrap(), 0);
}
