use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db;
use crate::estimation::CarbEstimator;
use crate::meals::repo::MealStore;
use crate::meals::services::MealLogger;
use crate::notify;

#[derive(Clone)]
pub struct AppState {
    pub meals: Arc<MealLogger>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let pool = db::connect(&config.database_url, config.max_connections).await?;
        let estimator = Arc::new(CarbEstimator::new(config.estimator.clone())?);
        let notifier = notify::from_config(&config.notifier);

        let meals = MealLogger::new(
            estimator,
            MealStore::new(pool),
            notifier,
            Duration::from_millis(config.notifier.timeout_ms),
        );
        Ok(Self::from_parts(meals))
    }

    pub fn from_parts(meals: MealLogger) -> Self {
        Self {
            meals: Arc::new(meals),
        }
    }
}
