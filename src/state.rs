use std::sync::Arc;
use std::time::Duration;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    cache::EmployerCache,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    extract::TextExtractor,
    storage::BlobStore,
};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn BlobStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub jwt: JwtService,
    pub employers: EmployerCache,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        extractor: Arc<dyn TextExtractor>,
        jwt: JwtService,
    ) -> Self {
        let employers =
            EmployerCache::new(Duration::from_secs(config.employer_cache_ttl_seconds));
        Self {
            pool,
            config: Arc::new(config),
            storage,
            extractor,
            jwt,
            employers,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
