use std::sync::Arc;

use crate::{
    config::{Config, StorageBackend},
    store::{memory::InMemoryStore, mongo::MongoStore, LearningStore},
};

use self::{
    performance_service::{PerformanceAggregator, PerformanceRecomputer},
    text_generation::{HttpTextGenerator, TextGenerator},
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LearningStore>,
    pub recomputer: Arc<dyn PerformanceRecomputer>,
    pub text_generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn LearningStore> = match config.storage.backend {
            StorageBackend::Mongo => {
                tracing::info!("Connecting to MongoDB...");
                let mongo = tokio::time::timeout(
                    std::time::Duration::from_secs(30),
                    MongoStore::connect(&config.storage.mongo_uri, &config.storage.mongo_database),
                )
                .await
                .map_err(|_| anyhow::anyhow!("MongoDB connection timeout after 30s"))??;
                mongo.ensure_indexes().await?;
                Arc::new(mongo)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(InMemoryStore::new())
            }
        };

        let text_generator = Arc::new(HttpTextGenerator::new(&config.text_generation)?);

        Ok(Self::from_parts(config, store, text_generator))
    }

    /// Wires the default aggregator over an already constructed store.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn LearningStore>,
        text_generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let recomputer = Arc::new(PerformanceAggregator::new(store.clone()));
        Self {
            config,
            store,
            recomputer,
            text_generator,
        }
    }
}

pub mod access_policy;
pub mod context_service;
pub mod course_service;
pub mod dashboard_service;
pub mod enrollment_service;
pub mod identity_service;
pub mod performance_service;
pub mod text_generation;
pub mod tracking_service;
pub mod tutor_service;
