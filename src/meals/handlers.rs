use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{EstimateCarbsRequest, ListMealsQuery, LogMealRequest, LogMealResponse};
use crate::error::PipelineError;
use crate::estimation::CarbEstimate;
use crate::meals::model::Meal;
use crate::meals::services::LogOutcome;
use crate::state::AppState;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:id", get(get_meal))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(log_meal))
        .route("/meals/:id", axum::routing::delete(delete_meal))
        .route("/carbs/estimate", post(estimate_carbs))
}

// --- handlers ---

/// POST /meals { description, timestamp? }
/// 201 with the stored meal, or 200 with clarifying questions.
#[instrument(skip(state, body))]
pub async fn log_meal(
    State(state): State<AppState>,
    Json(body): Json<LogMealRequest>,
) -> Result<(StatusCode, Json<LogMealResponse>), PipelineError> {
    let outcome = state
        .meals
        .log_meal(&body.description, body.timestamp.as_deref())
        .await?;
    let status = match outcome {
        LogOutcome::Logged(_) => StatusCode::CREATED,
        LogOutcome::ClarificationNeeded { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome.into())))
}

#[instrument(skip(state, body))]
pub async fn estimate_carbs(
    State(state): State<AppState>,
    Json(body): Json<EstimateCarbsRequest>,
) -> Result<Json<CarbEstimate>, PipelineError> {
    let estimate = state
        .meals
        .estimate_carbs(&body.meal_description, body.ask_clarifications)
        .await?;
    Ok(Json(estimate))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    Query(q): Query<ListMealsQuery>,
) -> Result<Json<Vec<Meal>>, PipelineError> {
    let meals = state
        .meals
        .list_meals(q.start_date.as_deref(), q.end_date.as_deref(), q.limit)
        .await?;
    Ok(Json(meals))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meal>, PipelineError> {
    Ok(Json(state.meals.get_meal(id).await?))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, PipelineError> {
    state.meals.delete_meal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
