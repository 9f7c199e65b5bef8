use sqlx::FromRow;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::meals::model::{Confidence, Food, Meal};

/// Meal header as stored in the `meals` table.
#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: String,
    pub description: String,
    pub timestamp: String,
    pub total_carbs: f64,
    pub confidence: String,
    pub created_at: String,
    pub updated_at: String,
    pub source: String,
}

#[derive(Debug, FromRow)]
pub struct FoodRow {
    pub name: String,
    pub quantity: String,
    pub carbs_per_100g: f64,
    pub estimated_carbs: f64,
    pub confidence: String,
}

/// UTC with fixed-width nanoseconds, so text order is time order.
pub fn encode_timestamp(ts: OffsetDateTime) -> Result<String, PipelineError> {
    ts.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .map_err(|e| PipelineError::Persistence(format!("encode timestamp: {e}")))
}

fn decode_timestamp(id: &str, field: &str, raw: &str) -> Result<OffsetDateTime, PipelineError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| PipelineError::corrupt(id, format!("{field} `{raw}`: {e}")))
}

impl MealRow {
    /// Decodes the header and attaches its foods, in stored order.
    pub fn into_meal(self, foods: Vec<FoodRow>) -> Result<Meal, PipelineError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| PipelineError::corrupt(&self.id, format!("id: {e}")))?;
        let foods = foods
            .into_iter()
            .map(|f| f.into_food(&self.id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Meal {
            id,
            timestamp: decode_timestamp(&self.id, "timestamp", &self.timestamp)?,
            created_at: decode_timestamp(&self.id, "created_at", &self.created_at)?,
            updated_at: decode_timestamp(&self.id, "updated_at", &self.updated_at)?,
            confidence: self
                .confidence
                .parse::<Confidence>()
                .map_err(|e| PipelineError::corrupt(&self.id, e))?,
            source: self
                .source
                .parse()
                .map_err(|e: String| PipelineError::corrupt(&self.id, e))?,
            description: self.description,
            total_carbs: self.total_carbs,
            foods,
        })
    }
}

impl FoodRow {
    fn into_food(self, meal_id: &str) -> Result<Food, PipelineError> {
        Ok(Food {
            confidence: self
                .confidence
                .parse()
                .map_err(|e: String| PipelineError::corrupt(meal_id, e))?,
            name: self.name,
            quantity: self.quantity,
            carbs_per_100g: self.carbs_per_100g,
            estimated_carbs: self.estimated_carbs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn encoded_timestamps_are_utc_and_fixed_width() {
        let ts = datetime!(2024-01-15 14:30:05.25 +02:00);
        let encoded = encode_timestamp(ts).unwrap();
        assert_eq!(encoded, "2024-01-15T12:30:05.250000000Z");
        assert_eq!(decode_timestamp("m", "timestamp", &encoded).unwrap(), ts);
    }

    #[test]
    fn undecodable_timestamp_is_corrupt_record() {
        let err = decode_timestamp("m1", "timestamp", "yesterday-ish").unwrap_err();
        assert!(matches!(err, PipelineError::CorruptRecord { id, .. } if id == "m1"));
    }

    #[test]
    fn unknown_confidence_is_corrupt_record() {
        let row = MealRow {
            id: Uuid::new_v4().to_string(),
            description: "x".into(),
            timestamp: "2024-01-15T12:30:00.000000000Z".into(),
            total_carbs: 1.0,
            confidence: "sure".into(),
            created_at: "2024-01-15T12:30:00.000000000Z".into(),
            updated_at: "2024-01-15T12:30:00.000000000Z".into(),
            source: "ai_parsed".into(),
        };
        assert!(matches!(
            row.into_meal(vec![]),
            Err(PipelineError::CorruptRecord { .. })
        ));
    }
}
