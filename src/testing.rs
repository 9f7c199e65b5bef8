//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::EstimatorConfig;
use crate::estimation::{CarbEstimator, CompletionProvider, CompletionRequest};
use crate::meals::model::{Confidence, Food, Meal, MealSource};
use crate::meals::repo::MealStore;
use crate::meals::services::MealLogger;
use crate::notify::MealNotifier;

enum Script {
    Reply(String),
    Fail(String),
    Stall(Duration),
}

/// Completion provider that answers every call the same way.
pub struct ScriptedProvider {
    script: Script,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn with(script: Script) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(text: &str) -> Self {
        Self::with(Script::Reply(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Script::Fail(message.to_string()))
    }

    pub fn stalled(delay: Duration) -> Self {
        Self::with(Script::Stall(delay))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(message) => Err(anyhow::anyhow!(message.clone())),
            Script::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(String::new())
            }
        }
    }
}

/// Forwards every notified meal to a channel, optionally reporting failure.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Meal>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Meal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: false }, rx)
    }

    pub fn failing() -> (Self, mpsc::UnboundedReceiver<Meal>) {
        let (mut notifier, rx) = Self::new();
        notifier.fail = true;
        (notifier, rx)
    }
}

#[async_trait]
impl MealNotifier for RecordingNotifier {
    async fn notify(&self, meal: &Meal) -> anyhow::Result<()> {
        let _ = self.tx.send(meal.clone());
        if self.fail {
            anyhow::bail!("knowledge base unreachable");
        }
        Ok(())
    }
}

pub async fn memory_store() -> MealStore {
    let pool = crate::db::connect_in_memory()
        .await
        .expect("in-memory database");
    MealStore::new(pool)
}

pub fn test_estimator(provider: ScriptedProvider) -> CarbEstimator {
    let config = EstimatorConfig {
        timeout_ms: 500,
        ..EstimatorConfig::default()
    };
    CarbEstimator::with_provider(Arc::new(provider), config)
}

pub fn logger_on(
    store: MealStore,
    provider: ScriptedProvider,
    notifier: RecordingNotifier,
) -> MealLogger {
    MealLogger::new(
        Arc::new(test_estimator(provider)),
        store,
        Arc::new(notifier),
        Duration::from_millis(500),
    )
}

pub async fn logger_with(provider: ScriptedProvider, notifier: RecordingNotifier) -> MealLogger {
    logger_on(memory_store().await, provider, notifier)
}

/// Two-item breakfast (51.5 g) at the given time.
pub fn sample_meal(timestamp: OffsetDateTime) -> Meal {
    let now = OffsetDateTime::now_utc();
    Meal {
        id: Uuid::new_v4(),
        description: "oatmeal with a banana".into(),
        timestamp,
        foods: vec![
            Food {
                name: "oatmeal".into(),
                quantity: "1 cup".into(),
                carbs_per_100g: 12.0,
                estimated_carbs: 27.0,
                confidence: Confidence::High,
            },
            Food {
                name: "banana".into(),
                quantity: "1 medium".into(),
                carbs_per_100g: 23.0,
                estimated_carbs: 24.5,
                confidence: Confidence::Medium,
            },
        ],
        total_carbs: 51.5,
        confidence: Confidence::High,
        created_at: now,
        updated_at: now,
        source: MealSource::AiParsed,
    }
}

pub async fn test_state(provider: ScriptedProvider) -> crate::state::AppState {
    let (notifier, _rx) = RecordingNotifier::new();
    crate::state::AppState::from_parts(logger_with(provider, notifier).await)
}
