#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use learnsphere_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        course::{Course, Lesson, LessonKind},
        user::{Role, User},
    },
    services::{
        text_generation::{TextGenerator, UpstreamError},
        AppState,
    },
    store::{memory::InMemoryStore, CatalogStore},
};
use serde_json::Value;
use tower::ServiceExt;

/// What the scripted generator does on each call.
#[derive(Clone)]
pub enum Script {
    Reply(String),
    Fail(UpstreamError),
    /// Never answers within any reasonable timeout.
    Hang,
}

pub struct ScriptedGenerator {
    script: Mutex<Script>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    fn new() -> Self {
        Self {
            script: Mutex::new(Script::Reply("Keep practicing fractions.".to_string())),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn set(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());

        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Reply(text) => Ok(text),
            Script::Fail(err) => Err(err),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
    jwt: JwtService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let mut config = Config::default();
        customize(&mut config);

        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new());
        let jwt = JwtService::new(&config.auth.jwt_secret);
        let state = Arc::new(AppState::from_parts(
            config,
            store.clone(),
            generator.clone(),
        ));

        Self {
            router: create_router(state),
            store,
            generator,
            jwt,
        }
    }

    pub fn token(&self, subject: &str, email: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        self.jwt
            .generate_token(&JwtClaims {
                sub: subject.to_string(),
                email: Some(email.to_string()),
                exp: (now + 3600) as usize,
                iat: now as usize,
            })
            .unwrap()
    }

    /// Stores a user with the given role and returns a bearer token for it.
    pub async fn user(&self, role: Role, name: &str) -> (User, String) {
        let email = format!("{name}@example.com");
        let user = User::new(format!("idp|{name}"), &email, role);
        self.store.insert_user(&user).await.unwrap();
        let token = self.token(&user.subject, &email);
        (user, token)
    }

    pub async fn course(&self, owner: &User, title: &str) -> Course {
        let course = Course {
            id: learnsphere_api::models::new_id(),
            title: title.to_string(),
            description: None,
            created_by: owner.id.clone(),
            created_at: chrono::Utc::now(),
        };
        self.store.insert_course(&course).await.unwrap();
        course
    }

    pub async fn lesson(&self, course: &Course, title: &str, order_index: i32) -> Lesson {
        let lesson = Lesson {
            id: learnsphere_api::models::new_id(),
            course_id: course.id.clone(),
            title: title.to_string(),
            kind: LessonKind::Quiz,
            duration_minutes: 15,
            order_index,
        };
        self.store.insert_lesson(&lesson).await.unwrap();
        lesson
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }
}
