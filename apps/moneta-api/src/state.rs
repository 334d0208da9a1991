use std::sync::Arc;

use moneta_config::Config;
use moneta_service::{MonetaService, PgStore, Providers};
use moneta_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonetaService>,
}

impl AppState {
    pub async fn new(config: Config) -> color_eyre::Result<Self> {
        let db = Db::connect(&config.storage.postgres).await?;
        let qdrant = QdrantStore::new(&config.storage.qdrant)?;
        let store = PgStore { db, qdrant };
        store.ensure_ready().await?;
        let service = MonetaService::with_store(config, Arc::new(store), Providers::default());
        Ok(Self { service: Arc::new(service) })
    }

    pub fn with_service(service: MonetaService) -> Self {
        Self { service: Arc::new(service) }
    }
}
