use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::estimation::CarbEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Case-insensitive match for provider output; anything unrecognised is `Low`.
    pub fn lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Self::Low)
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown confidence `{other}`")),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a meal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSource {
    AiParsed,
    Manual,
}

impl MealSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiParsed => "ai_parsed",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for MealSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_parsed" => Ok(Self::AiParsed),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown source `{other}`")),
        }
    }
}

impl fmt::Display for MealSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One estimated component of a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub name: String,
    pub quantity: String,   // free text, e.g. "1 cup"
    pub carbs_per_100g: f64,
    pub estimated_carbs: f64, // grams for `quantity`
    pub confidence: Confidence,
}

/// A logged eating event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub foods: Vec<Food>,
    pub total_carbs: f64,
    pub confidence: Confidence,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    // Write-once: equals created_at until an update path exists.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub source: MealSource,
}

impl Meal {
    /// Builds a fresh meal from a finalized estimate.
    pub fn from_estimate(
        description: String,
        timestamp: OffsetDateTime,
        estimate: CarbEstimate,
        source: MealSource,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            description,
            timestamp,
            total_carbs: estimate.total_carbs,
            confidence: estimate.confidence,
            foods: estimate.foods,
            created_at: now,
            updated_at: now,
            source,
        }
    }
}
