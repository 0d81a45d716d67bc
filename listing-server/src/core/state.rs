use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::images::{self, ImageStore, UploadPolicy};
use crate::utils::{AppError, AppResult};

/// Per-property write locks
///
/// Serializes mutations (update, delete) of one property so two concurrent
/// reconciliations cannot interleave. Reads never take the lock.
#[derive(Debug, Default)]
pub struct PropertyLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl PropertyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a property
    pub async fn acquire(&self, property_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(property_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the entry of a deleted property once nobody else holds it
    pub fn forget(&self, property_id: i64) {
        self.locks
            .remove_if(&property_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Server state, shared by every handler
///
/// | Field | Type | Purpose |
/// |-------|------|---------|
/// | config | Config | immutable settings |
/// | db | DbService | SQLite pool |
/// | image_store | Arc<dyn ImageStore> | configured image backend |
/// | jwt_service | Arc<JwtService> | token verification |
/// | property_locks | Arc<PropertyLocks> | per-property write locks |
/// | property_uploads / staged_uploads | UploadPolicy | upload limits |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub image_store: Arc<dyn ImageStore>,
    pub jwt_service: Arc<JwtService>,
    pub property_locks: Arc<PropertyLocks>,
    pub property_uploads: UploadPolicy,
    pub staged_uploads: UploadPolicy,
}

impl ServerState {
    /// Initialize the server state
    ///
    /// 1. Work and upload directories
    /// 2. Database (DATABASE_PATH) and migrations
    /// 3. Image store and JWT service
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        for dir in [&config.work_dir, &config.upload_root] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::internal(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::internal(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let db_path = config.database_path.to_string_lossy();
        let db = DbService::new(&db_path).await?;
        Self::with_db(config.clone(), db)
    }

    /// Build the state around an already opened database
    pub fn with_db(config: Config, db: DbService) -> AppResult<Self> {
        let jwt_service = JwtService::with_config(config.jwt.clone())
            .map_err(|e| AppError::internal(e.to_string()))?;
        let image_store = images::build_store(config.image_storage, config.upload_root.clone());

        tracing::info!(
            storage = %config.image_storage,
            upload_root = %config.upload_root.display(),
            "Image store ready"
        );

        Ok(Self {
            property_uploads: config.property_upload_policy(),
            staged_uploads: config.staged_upload_policy(),
            config,
            db,
            image_store,
            jwt_service: Arc::new(jwt_service),
            property_locks: Arc::new(PropertyLocks::new()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn image_store(&self) -> &dyn ImageStore {
        self.image_store.as_ref()
    }
}
