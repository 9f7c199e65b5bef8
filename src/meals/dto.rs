use serde::{Deserialize, Serialize};

use crate::estimation::CarbEstimate;
use crate::meals::model::Meal;
use crate::meals::services::LogOutcome;

#[derive(Debug, Deserialize)]
pub struct LogMealRequest {
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<String>, // RFC 3339, defaults to now
}

#[derive(Debug, Deserialize)]
pub struct EstimateCarbsRequest {
    pub meal_description: String,
    #[serde(default)]
    pub ask_clarifications: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMealsQuery {
    pub start_date: Option<String>, // YYYY-MM-DD
    pub end_date: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LogMealResponse {
    Logged(Meal),
    NeedsClarification {
        clarifications: Vec<String>,
        preliminary_analysis: CarbEstimate,
    },
}

impl From<LogOutcome> for LogMealResponse {
    fn from(outcome: LogOutcome) -> Self {
        match outcome {
            LogOutcome::Logged(meal) => Self::Logged(meal),
            LogOutcome::ClarificationNeeded {
                clarifications,
                preliminary,
            } => Self::NeedsClarification {
                clarifications,
                preliminary_analysis: preliminary,
            },
        }
    }
}
