use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::middlewares::auth::JwtService;
use mongodb::{Client as MongoClient, Database};

use self::assessment_service::AssessmentService;
use self::assessment_store::{AssessmentStore, AttemptSink, MongoAssessmentStore, MongoAttemptLog};
use self::knowledge_tracing::KnowledgeTracingClient;
use self::object_storage::ObjectStorageClient;
use self::quiz_service::QuizService;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub jwt: JwtService,
    pub assessments: AssessmentService,
    pub quizzes: QuizService,
    pub storage: Option<ObjectStorageClient>,
    pub kt: KnowledgeTracingClient,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let store: Arc<dyn AssessmentStore> = Arc::new(MongoAssessmentStore::new(mongo.clone()));
        let sink: Arc<dyn AttemptSink> = Arc::new(MongoAttemptLog::new(mongo.clone()));

        Self::with_stores(config, mongo, store, sink)
    }

    /// Состояние с подменяемыми хранилищами попыток (тесты)
    pub fn with_stores(
        config: Config,
        mongo: Database,
        store: Arc<dyn AssessmentStore>,
        sink: Arc<dyn AttemptSink>,
    ) -> anyhow::Result<Self> {
        let storage = match config.object_storage.clone() {
            Some(settings) => {
                let client = ObjectStorageClient::new(settings)?;
                tracing::info!("Object storage configured");
                Some(client)
            }
            None => {
                tracing::warn!("Object storage is not configured, uploads are disabled");
                None
            }
        };

        let kt = KnowledgeTracingClient::new(config.kt_api_url.clone())?;
        let assessments = AssessmentService::new(
            store.clone(),
            Duration::from_millis(config.flow.feedback_delay_ms),
        );
        let quizzes = QuizService::new(
            store,
            sink,
            Duration::from_millis(config.flow.quiz_feedback_delay_ms),
            config.flow.quiz_length,
        );

        Ok(Self {
            jwt: JwtService::new(&config.jwt_secret),
            config,
            mongo,
            assessments,
            quizzes,
            storage,
            kt,
        })
    }
}

/// Фоновая очистка: брошенные сессии и старые итоги
pub async fn run_session_sweeper(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.flow.session_sweep_interval_secs);
    let max_idle = Duration::from_secs(state.config.flow.session_idle_timeout_secs);
    tracing::info!(
        "Starting session sweeper (interval {}s, idle timeout {}s)",
        interval.as_secs(),
        max_idle.as_secs()
    );

    loop {
        tokio::time::sleep(interval).await;

        let flows = state.assessments.sweep(max_idle).await;
        let quizzes = state.quizzes.sweep(max_idle).await;
        if flows + quizzes > 0 {
            tracing::info!(flows, quizzes, "Session sweep dropped stale entries");
        }
    }
}

pub mod assessment_service;
pub mod assessment_store;
pub mod assignment_service;
pub mod auth_service;
pub mod class_service;
pub mod knowledge_tracing;
pub mod material_service;
pub mod object_storage;
pub mod question_service;
pub mod quiz_service;
pub mod topic_service;
