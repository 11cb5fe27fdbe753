use serde::Deserialize;
use std::env;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub text_generation: TextGenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Email that is provisioned as admin on first sign-in.
    #[serde(default)]
    pub super_admin_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextGenerationConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:8081".to_string(),
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                mongo_uri: "mongodb://localhost:27017/?replicaSet=rs0".to_string(),
                mongo_database: "learnsphere".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                super_admin_email: None,
            },
            text_generation: TextGenerationConfig {
                base_url: "https://platform.qubrid.com/api/v1/qubridai".to_string(),
                api_key: String::new(),
                model: "meta-llama/Llama-3.3-70B-Instruct".to_string(),
                max_tokens: 4096,
                temperature: 0.7,
                top_p: 0.9,
                timeout_secs: 60,
            },
        }
    }
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
        let defaults = Config::default();
        let generation = defaults.text_generation;

        // Legacy plain env names act as defaults; config files and APP__* win
        let settings = config::Config::builder()
            .set_default("server.bind_addr", defaults.server.bind_addr)?
            .set_default("storage.backend", "mongo")?
            .set_default(
                "storage.mongo_uri",
                env::var("MONGO_URI").unwrap_or(defaults.storage.mongo_uri),
            )?
            .set_default("storage.mongo_database", defaults.storage.mongo_database)?
            .set_default(
                "auth.jwt_secret",
                env::var("JWT_SECRET").unwrap_or(defaults.auth.jwt_secret),
            )?
            .set_default("text_generation.base_url", generation.base_url)?
            .set_default(
                "text_generation.api_key",
                env::var("TEXT_GENERATION_API_KEY").unwrap_or_default(),
            )?
            .set_default("text_generation.model", generation.model)?
            .set_default("text_generation.max_tokens", generation.max_tokens as i64)?
            .set_default("text_generation.temperature", generation.temperature)?
            .set_default("text_generation.top_p", generation.top_p)?
            .set_default(
                "text_generation.timeout_secs",
                generation.timeout_secs as i64,
            )?
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut config: Config = settings.try_deserialize()?;

        if config.auth.jwt_secret == DEV_JWT_SECRET {
            if env == "prod" {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
        }

        config.auth.super_admin_email = config
            .auth
            .super_admin_email
            .take()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty());

        Ok(config)
    }
}
