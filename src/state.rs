use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    auth::services::AuthStore,
    config::AppConfig,
    storage::{FileStore, KeyValueStore, MemoryStore, Storage},
    tasks::services::TaskStore,
    users::services::UserStore,
};

/// The three stores sharing one storage location.
pub struct Workspace {
    pub auth: AuthStore,
    pub tasks: TaskStore,
    pub users: UserStore,
}

impl Workspace {
    pub fn open(storage: Storage) -> Self {
        Self {
            auth: AuthStore::new(storage.clone()),
            tasks: TaskStore::new(storage.clone()),
            users: UserStore::new(storage),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Arc<Mutex<Workspace>>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let backend: Arc<dyn KeyValueStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::new(dir)?),
            None => {
                info!("TASKDESK_DATA_DIR not set; data lives in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::from_parts(Arc::new(config), Storage::new(backend)))
    }

    pub fn from_parts(config: Arc<AppConfig>, storage: Storage) -> Self {
        Self {
            config,
            stores: Arc::new(Mutex::new(Workspace::open(storage))),
        }
    }

    pub fn fake() -> Self {
        Self::from_parts(Arc::new(AppConfig::in_memory()), Storage::in_memory())
    }
}
