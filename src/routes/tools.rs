use axum::{extract::State, routing::post, Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::PipelineError;
use crate::meals::dto::{EstimateCarbsRequest, ListMealsQuery, LogMealRequest, LogMealResponse};
use crate::state::AppState;

/// A decoded tool invocation: `{ "name": "...", "arguments": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

pub fn tool_routes() -> Router<AppState> {
    Router::new().route("/tools/call", post(call_tool))
}

fn arguments<T: DeserializeOwned>(raw: Value) -> Result<T, PipelineError> {
    let raw = if raw.is_null() {
        Value::Object(Default::default())
    } else {
        raw
    };
    serde_json::from_value(raw)
        .map_err(|e| PipelineError::InvalidInput(format!("invalid parameters: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(value)
        .map_err(|e| PipelineError::InvalidInput(format!("unserializable result: {e}")))
}

#[instrument(skip(state, call), fields(tool = %call.name))]
pub async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> Result<Json<Value>, PipelineError> {
    info!("tool call");
    let result = match call.name.as_str() {
        "log_meal" => {
            let p: LogMealRequest = arguments(call.arguments)?;
            let outcome = state
                .meals
                .log_meal(&p.description, p.timestamp.as_deref())
                .await?;
            to_json(&LogMealResponse::from(outcome))?
        }
        "calculate_carbs" => {
            let p: EstimateCarbsRequest = arguments(call.arguments)?;
            let estimate = state
                .meals
                .estimate_carbs(&p.meal_description, p.ask_clarifications)
                .await?;
            to_json(&estimate)?
        }
        "get_meals" => {
            let p: ListMealsQuery = arguments(call.arguments)?;
            let meals = state
                .meals
                .list_meals(p.start_date.as_deref(), p.end_date.as_deref(), p.limit)
                .await?;
            to_json(&meals)?
        }
        other => return Err(PipelineError::NotFound(format!("unknown tool `{other}`"))),
    };
    Ok(Json(result))
}
