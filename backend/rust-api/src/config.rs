use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    /// Base URL of the knowledge-tracing service (`/predict`)
    pub kt_api_url: String,
    pub bind_addr: String,
    pub flow: FlowSettings,
    pub object_storage: Option<ObjectStorageSettings>,
}

/// Fixed delays for the automatic Feedback transitions and session upkeep
#[derive(Debug, Clone, Deserialize)]
pub struct FlowSettings {
    pub feedback_delay_ms: u64,
    pub quiz_feedback_delay_ms: u64,
    pub quiz_length: u32,
    /// Sessions untouched this long are dropped; finished outcomes are kept as long
    pub session_idle_timeout_secs: u64,
    pub session_sweep_interval_secs: u64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            feedback_delay_ms: 1000,
            quiz_feedback_delay_ms: 1500,
            quiz_length: 5,
            session_idle_timeout_secs: 1800,
            session_sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStorageSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    /// Public base URL objects are served from, e.g. `https://cdn.example.com/pdf-uploads`
    pub public_base_url: Option<String>,
    pub prefix: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| {
                eprintln!("WARNING: MONGO_URI not set, using mongodb://localhost:27017");
                "mongodb://localhost:27017".to_string()
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "classroom".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::NotFound(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let jwt_ttl_seconds = settings
            .get_int("auth.jwt_ttl_seconds")
            .ok()
            .or_else(|| env_parse("JWT_ACCESS_TOKEN_TTL_SECONDS"))
            .filter(|v| *v > 0)
            .unwrap_or(3600);

        let kt_api_url = settings
            .get_string("knowledge_tracing.url")
            .or_else(|_| env::var("KT_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let defaults = FlowSettings::default();
        let flow = FlowSettings {
            feedback_delay_ms: settings
                .get_int("flow.feedback_delay_ms")
                .ok()
                .or_else(|| env_parse("FLOW_FEEDBACK_DELAY_MS"))
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.feedback_delay_ms),
            quiz_feedback_delay_ms: settings
                .get_int("flow.quiz_feedback_delay_ms")
                .ok()
                .or_else(|| env_parse("QUIZ_FEEDBACK_DELAY_MS"))
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.quiz_feedback_delay_ms),
            quiz_length: settings
                .get_int("flow.quiz_length")
                .ok()
                .filter(|v| *v > 0)
                .map(|v| v as u32)
                .unwrap_or(defaults.quiz_length),
            session_idle_timeout_secs: settings
                .get_int("flow.session_idle_timeout_secs")
                .ok()
                .or_else(|| env_parse("SESSION_IDLE_TIMEOUT_SECS"))
                .filter(|v| *v > 0)
                .map(|v| v as u64)
                .unwrap_or(defaults.session_idle_timeout_secs),
            session_sweep_interval_secs: settings
                .get_int("flow.session_sweep_interval_secs")
                .ok()
                .filter(|v| *v > 0)
                .map(|v| v as u64)
                .unwrap_or(defaults.session_sweep_interval_secs),
        };

        let object_storage = settings
            .get::<ObjectStorageSettings>("object_storage")
            .ok()
            .or_else(object_storage_from_env);

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            jwt_ttl_seconds,
            kt_api_url,
            bind_addr,
            flow,
            object_storage,
        })
    }
}

fn env_parse(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

fn object_storage_from_env() -> Option<ObjectStorageSettings> {
    let bucket = env::var("OBJECT_STORAGE_BUCKET").ok()?;
    let access_key = env::var("OBJECT_STORAGE_ACCESS_KEY").ok()?;
    let secret_key = env::var("OBJECT_STORAGE_SECRET_KEY").ok()?;

    Some(ObjectStorageSettings {
        bucket,
        region: env::var("OBJECT_STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        endpoint: env::var("OBJECT_STORAGE_ENDPOINT").ok(),
        access_key,
        secret_key,
        public_base_url: env::var("OBJECT_STORAGE_PUBLIC_URL").ok(),
        prefix: env::var("OBJECT_STORAGE_PREFIX").unwrap_or_default(),
    })
}
