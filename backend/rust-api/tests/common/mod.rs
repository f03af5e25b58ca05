#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use classroom_api::{
    config::{Config, FlowSettings},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{
        user::UserRole, AnswerOption, AssessmentPlan, AttemptLog, CompletionRecord,
        DifficultyTier, Question, QuestionSet,
    },
    services::{
        assessment_store::{interventions_from, AssessmentStore, AttemptSink, PlanError},
        AppState,
    },
};
use mongodb::{bson::doc, options::ClientOptions, Database};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Plans served from memory; completions are recorded for assertions
#[derive(Default)]
pub struct InMemoryStore {
    pub plans: HashMap<String, AssessmentPlan>,
    pub completions: Mutex<Vec<CompletionRecord>>,
}

impl InMemoryStore {
    pub fn with_plan(plan: AssessmentPlan) -> Self {
        let mut plans = HashMap::new();
        plans.insert(plan.assignment_id.clone(), plan);
        Self {
            plans,
            ..Default::default()
        }
    }

    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }
}

#[async_trait]
impl AssessmentStore for InMemoryStore {
    async fn load_plan(
        &self,
        assignment_id: &str,
        _student_id: &str,
    ) -> Result<AssessmentPlan, PlanError> {
        self.plans
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| PlanError::AssignmentNotFound(assignment_id.to_string()))
    }

    async fn mark_completed(&self, record: &CompletionRecord) -> anyhow::Result<()> {
        self.completions.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySink {
    pub attempts: Mutex<Vec<AttemptLog>>,
}

#[async_trait]
impl AttemptSink for InMemorySink {
    async fn record(&self, attempt: &AttemptLog) -> anyhow::Result<()> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://127.0.0.1:27017".to_string(),
        mongo_database: "classroom_test".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_ttl_seconds: 3600,
        kt_api_url: "http://127.0.0.1:9".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        flow: FlowSettings {
            feedback_delay_ms: 20,
            quiz_feedback_delay_ms: 20,
            quiz_length: 5,
            ..FlowSettings::default()
        },
        object_storage: None,
    }
}

/// Router over in-memory collaborators. The Mongo client never connects
/// unless a handler actually queries it.
pub async fn create_test_app(store: Arc<InMemoryStore>, sink: Arc<InMemorySink>) -> Router {
    create_test_app_with_config(test_config(), store, sink).await
}

pub async fn create_test_app_with_config(
    config: Config,
    store: Arc<InMemoryStore>,
    sink: Arc<InMemorySink>,
) -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create MongoDB client");
    let mongo = mongo_client.database(&config.mongo_database);

    let state = AppState::with_stores(config, mongo, store, sink)
        .expect("Failed to initialize test app state");

    create_router(Arc::new(state))
}

/// Router over a real MongoDB, one fresh database per test
pub struct MongoTestApp {
    pub router: Router,
    pub db: Database,
}

impl MongoTestApp {
    pub async fn cleanup(self) {
        if let Err(e) = self.db.drop().await {
            eprintln!("Failed to drop test database: {}", e);
        }
    }
}

/// Connects to MONGO_URI (see .env.test). Returns None when no server answers,
/// so database-backed suites are skipped on machines without MongoDB.
pub async fn create_mongo_test_app() -> Option<MongoTestApp> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    dotenvy::from_filename(".env.test").ok();
    let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());

    let mut options = ClientOptions::parse(&uri)
        .await
        .expect("Failed to parse MONGO_URI");
    options.server_selection_timeout = Some(Duration::from_secs(2));
    let client = mongodb::Client::with_options(options).expect("Failed to create MongoDB client");

    let db_name = format!("classroom_test_{}", uuid::Uuid::new_v4().simple());
    let db = client.database(&db_name);
    if let Err(e) = db.run_command(doc! { "ping": 1 }).await {
        eprintln!("MongoDB is not reachable at {} ({}), skipping", uri, e);
        return None;
    }

    let mut config = test_config();
    config.mongo_uri = uri;
    config.mongo_database = db_name;

    let state = AppState::new(config, client)
        .await
        .expect("Failed to initialize test app state");

    Some(MongoTestApp {
        router: create_router(Arc::new(state)),
        db,
    })
}

pub fn token(user_id: &str, role: UserRole) -> String {
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(&JwtClaims::new(user_id, role, 3600))
        .expect("Failed to sign test token")
}

pub fn question(id: &str, difficulty: DifficultyTier) -> Question {
    Question {
        id: id.to_string(),
        teacher_id: "teacher-1".into(),
        title: format!("Question {}", id),
        text: format!("What is the answer to {}?", id),
        options: vec![
            AnswerOption {
                text: "right".into(),
                is_correct: true,
            },
            AnswerOption {
                text: "wrong".into(),
                is_correct: false,
            },
        ],
        difficulty,
        subject: "Math".into(),
        topic: "Fractions".into(),
        tags: Vec::new(),
        image_url: None,
        created_at: Utc::now(),
    }
}

pub fn plan(assignment_id: &str, default: Vec<Question>, alternate: Vec<Question>) -> AssessmentPlan {
    AssessmentPlan {
        assignment_id: assignment_id.to_string(),
        class_id: "class-1".into(),
        title: "Fractions".into(),
        default_set: QuestionSet::new("Fractions", default),
        alternate_set: QuestionSet::new("Prerequisite review", alternate),
        interventions: interventions_from(None),
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Polls `uri` until its `phase` field equals `phase`
pub async fn wait_for_phase(app: &Router, uri: &str, token: &str, phase: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = send(app, "GET", uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        if body["phase"] == phase {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached phase {}", uri, phase);
}
