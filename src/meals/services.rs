use std::sync::Arc;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::estimation::{CarbEstimate, CarbEstimator};
use crate::meals::model::{Meal, MealSource};
use crate::meals::repo::{MealQuery, MealStore};
use crate::notify::{self, MealNotifier};

pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Terminal result of a log-meal request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    Logged(Meal),
    /// Nothing was stored; the caller resubmits with more detail.
    ClarificationNeeded {
        clarifications: Vec<String>,
        preliminary: CarbEstimate,
    },
}

/// Coordinates estimation, the clarify-or-commit decision and persistence.
pub struct MealLogger {
    estimator: Arc<CarbEstimator>,
    store: MealStore,
    notifier: Arc<dyn MealNotifier>,
    notify_timeout: Duration,
}

impl MealLogger {
    pub fn new(
        estimator: Arc<CarbEstimator>,
        store: MealStore,
        notifier: Arc<dyn MealNotifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            estimator,
            store,
            notifier,
            notify_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn log_meal(
        &self,
        description: &str,
        timestamp: Option<&str>,
    ) -> PipelineResult<LogOutcome> {
        validate_description(description)?;
        let occurred_at = resolve_timestamp(timestamp)?;

        // Estimation finishes before any transaction is opened.
        let estimate = self.estimator.estimate(description, true).await?;

        if estimate.wants_clarification() {
            info!(questions = estimate.clarifications.len(), "meal needs clarification");
            return Ok(LogOutcome::ClarificationNeeded {
                clarifications: estimate.clarifications.clone(),
                preliminary: estimate,
            });
        }

        let meal = Meal::from_estimate(
            description.to_string(),
            occurred_at,
            estimate,
            MealSource::AiParsed,
        );
        self.store.save_meal(&meal).await?;
        info!(meal_id = %meal.id, total_carbs = meal.total_carbs, "meal logged");

        notify::dispatch(self.notifier.clone(), meal.clone(), self.notify_timeout);
        Ok(LogOutcome::Logged(meal))
    }

    /// Carb calculation without logging.
    #[instrument(skip(self))]
    pub async fn estimate_carbs(
        &self,
        description: &str,
        allow_clarifications: bool,
    ) -> PipelineResult<CarbEstimate> {
        validate_description(description)?;
        self.estimator.estimate(description, allow_clarifications).await
    }

    #[instrument(skip(self))]
    pub async fn list_meals(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        limit: Option<i64>,
    ) -> PipelineResult<Vec<Meal>> {
        let query = MealQuery {
            start_date: parse_date("start_date", start_date)?,
            end_date: parse_date("end_date", end_date)?,
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIST_LIMIT),
        };
        self.store.get_meals(query).await
    }

    pub async fn get_meal(&self, id: Uuid) -> PipelineResult<Meal> {
        self.store
            .get_meal(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("meal {id}")))
    }

    pub async fn delete_meal(&self, id: Uuid) -> PipelineResult<()> {
        if self.store.delete_meal(id).await? {
            info!(meal_id = %id, "meal deleted");
            Ok(())
        } else {
            Err(PipelineError::NotFound(format!("meal {id}")))
        }
    }
}

fn validate_description(description: &str) -> PipelineResult<()> {
    if description.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "meal description is required".into(),
        ));
    }
    Ok(())
}

/// Strict RFC 3339; absent or empty means now.
fn resolve_timestamp(raw: Option<&str>) -> PipelineResult<OffsetDateTime> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(OffsetDateTime::now_utc()),
        Some(s) => OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|e| PipelineError::InvalidInput(format!("invalid timestamp `{s}`: {e}"))),
    }
}

fn parse_date(field: &str, raw: Option<&str>) -> PipelineResult<Option<Date>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map(Some)
            .map_err(|e| {
                PipelineError::InvalidInput(format!("invalid {field} `{s}`, expected YYYY-MM-DD: {e}"))
            }),
    }
}
