use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::modules::jobs::executor::JobExecutor;
use crate::modules::jobs::store::JobStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub jobs: Arc<dyn JobStore>,
    pub executor: Arc<JobExecutor>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        jobs: Arc<dyn JobStore>,
        executor: Arc<JobExecutor>,
    ) -> Self {
        Self {
            config,
            db,
            jobs,
            executor,
        }
    }
}
