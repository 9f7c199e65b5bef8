use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{NotifierConfig, NotifierKind};
use crate::meals::model::{Food, Meal};

/// Receives every committed meal. Failures are advisory only.
#[async_trait]
pub trait MealNotifier: Send + Sync {
    async fn notify(&self, meal: &Meal) -> anyhow::Result<()>;
}

pub fn from_config(cfg: &NotifierConfig) -> Arc<dyn MealNotifier> {
    match cfg.kind {
        NotifierKind::KnowledgeGraph => Arc::new(KnowledgeGraphNotifier),
        NotifierKind::None => Arc::new(NoopNotifier),
    }
}

/// Runs the notifier on its own task so the caller never waits on it.
pub fn dispatch(notifier: Arc<dyn MealNotifier>, meal: Meal, bound: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::time::timeout(bound, notifier.notify(&meal)).await {
            Ok(Ok(())) => debug!(meal_id = %meal.id, "meal notification delivered"),
            Ok(Err(e)) => warn!(meal_id = %meal.id, error = %e, "meal notification failed"),
            Err(_) => warn!(
                meal_id = %meal.id,
                timeout_ms = bound.as_millis() as u64,
                "meal notification timed out"
            ),
        }
    })
}

pub struct NoopNotifier;

#[async_trait]
impl MealNotifier for NoopNotifier {
    async fn notify(&self, _meal: &Meal) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

/// Publishes a meal summary entity for the knowledge graph.
///
/// The sink is not wired to a remote memory service yet; the rendered
/// entity is emitted to the log.
pub struct KnowledgeGraphNotifier;

impl KnowledgeGraphNotifier {
    pub fn entity_for(meal: &Meal) -> anyhow::Result<KnowledgeEntity> {
        let stamp = meal
            .timestamp
            .format(format_description!("[year]-[month]-[day]_[hour]-[minute]"))?;
        Ok(KnowledgeEntity {
            name: format!("Meal_{stamp}"),
            entity_type: "Meal Entry".into(),
            observations: vec![
                format!("Description: {}", meal.description),
                format!("Total Carbs: {:.1} g", meal.total_carbs),
                format!("Timestamp: {}", meal.timestamp.format(&Rfc3339)?),
                format!("Confidence: {}", meal.confidence),
                format!("Foods: {}", format_foods(&meal.foods)),
                format!("Source: {}", meal.source),
            ],
        })
    }
}

#[async_trait]
impl MealNotifier for KnowledgeGraphNotifier {
    async fn notify(&self, meal: &Meal) -> anyhow::Result<()> {
        let entity = Self::entity_for(meal)?;
        let payload = serde_json::to_string(&entity)?;
        info!(meal_id = %meal.id, entity = %payload, "knowledge graph entity");
        Ok(())
    }
}

fn format_foods(foods: &[Food]) -> String {
    foods
        .iter()
        .map(|f| format!("{} ({}, {:.1}g carbs)", f.name, f.quantity, f.estimated_carbs))
        .collect::<Vec<_>>()
        .join("; ")
}
