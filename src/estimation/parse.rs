//! Turning free-form provider text into a [`CarbEstimate`].
//!
//! The provider is asked for JSON but replies in prose often enough that a
//! formatting miss must degrade the estimate rather than fail the request.
//! [`interpret`] never fails: anything it cannot read becomes the fallback
//! estimate.

use serde::Deserialize;
use tracing::{debug, warn};

use super::CarbEstimate;
use crate::meals::model::{Confidence, Food};

pub const FALLBACK_CLARIFICATIONS: [&str; 3] = [
    "What was the approximate portion size?",
    "How was the food prepared (fried, baked, etc.)?",
    "Were there any sauces or condiments?",
];

const SUMMARY_MAX_CHARS: usize = 120;
const TOTAL_TOLERANCE_G: f64 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error("no JSON object in provider output")]
    NoJsonObject,
    #[error("malformed estimate JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("estimate lists no foods")]
    NoFoods,
    #[error("invalid carbohydrate value for `{0}`")]
    InvalidCarbs(String),
    #[error("carbohydrate total is not finite")]
    TotalOverflow,
}

#[derive(Debug, Deserialize)]
struct RawFood {
    name: String,
    #[serde(default)]
    quantity: Option<String>,
    #[serde(default)]
    carbs_per_100g: Option<f64>,
    estimated_carbs: f64,
    #[serde(default)]
    confidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEstimate {
    #[serde(default)]
    foods: Vec<RawFood>,
    #[serde(default)]
    total_carbs: Option<f64>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    clarifications: Vec<String>,
    #[serde(default)]
    needs_more_info: bool,
}

/// Slice from the first `{` to the last `}`, if that is a non-empty span.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn interpret(text: &str, description: &str, allow_clarifications: bool) -> CarbEstimate {
    match parse_structured(text, allow_clarifications) {
        Ok(estimate) => estimate,
        Err(reason) => {
            warn!(%reason, output_len = text.len(), "estimate not parseable; using fallback");
            fallback_estimate(text, description)
        }
    }
}

pub fn parse_structured(
    text: &str,
    allow_clarifications: bool,
) -> Result<CarbEstimate, ParseFailure> {
    let json = extract_json_object(text).ok_or(ParseFailure::NoJsonObject)?;
    let raw: RawEstimate = serde_json::from_str(json)?;
    if raw.foods.is_empty() {
        return Err(ParseFailure::NoFoods);
    }

    let mut foods = Vec::with_capacity(raw.foods.len());
    for f in raw.foods {
        let per_100g = f.carbs_per_100g.unwrap_or(0.0);
        if !valid_grams(f.estimated_carbs) || !valid_grams(per_100g) {
            return Err(ParseFailure::InvalidCarbs(f.name));
        }
        foods.push(Food {
            name: f.name,
            quantity: f.quantity.unwrap_or_else(|| "unspecified".into()),
            carbs_per_100g: per_100g,
            estimated_carbs: f.estimated_carbs,
            confidence: Confidence::lenient(f.confidence.as_deref()),
        });
    }

    let total_carbs: f64 = foods.iter().map(|f| f.estimated_carbs).sum();
    if !total_carbs.is_finite() {
        return Err(ParseFailure::TotalOverflow);
    }
    if let Some(reported) = raw.total_carbs {
        if (reported - total_carbs).abs() > TOTAL_TOLERANCE_G {
            warn!(reported, computed = total_carbs, "provider total disagrees with foods");
        }
    }

    let needs_more_info = allow_clarifications && raw.needs_more_info;
    let clarifications = if needs_more_info {
        raw.clarifications
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect()
    } else {
        Vec::new()
    };

    debug!(foods = foods.len(), total_carbs, needs_more_info, "estimate parsed");
    Ok(CarbEstimate {
        foods,
        total_carbs,
        confidence: Confidence::lenient(raw.confidence.as_deref()),
        needs_more_info,
        clarifications,
    })
}

/// Deterministic low-confidence stand-in for unreadable provider output.
pub fn fallback_estimate(text: &str, description: &str) -> CarbEstimate {
    let summary = summarize(text).unwrap_or_else(|| summarize(description).unwrap_or_default());
    CarbEstimate {
        foods: vec![Food {
            name: format!("Unparsed estimate: {summary}"),
            quantity: "unknown".into(),
            carbs_per_100g: 0.0,
            estimated_carbs: 0.0,
            confidence: Confidence::Low,
        }],
        total_carbs: 0.0,
        confidence: Confidence::Low,
        needs_more_info: true,
        clarifications: FALLBACK_CLARIFICATIONS.iter().map(|q| q.to_string()).collect(),
    }
}

fn valid_grams(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn summarize(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(SUMMARY_MAX_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHICKEN: &str = r#"Sure! Here is the breakdown:
{
  "foods": [
    {"name": "grilled chicken breast", "quantity": "150 g", "carbs_per_100g": 0, "estimated_carbs": 0, "confidence": "high"},
    {"name": "steamed broccoli", "quantity": "1 cup", "carbs_per_100g": 7, "estimated_carbs": 6.5, "confidence": "high"}
  ],
  "total_carbs": 6.5,
  "confidence": "high",
  "clarifications": [],
  "needs_more_info": false
}
Let me know if you need anything else."#;

    fn assert_is_fallback(estimate: &CarbEstimate) {
        assert_eq!(estimate.foods.len(), 1);
        assert_eq!(estimate.confidence, Confidence::Low);
        assert_eq!(estimate.foods[0].confidence, Confidence::Low);
        assert!(estimate.needs_more_info);
        assert_eq!(estimate.clarifications, FALLBACK_CLARIFICATIONS.to_vec());
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let json = extract_json_object("here: {\"a\": {\"b\": 1}} done").unwrap();
        assert_eq!(json, "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn extract_requires_braces_in_order() {
        assert_eq!(extract_json_object("no json at all"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
        assert_eq!(extract_json_object("{"), None);
    }

    #[test]
    fn parses_estimate_from_prose_reply() {
        let estimate = interpret(CHICKEN, "chicken", true);
        assert_eq!(estimate.foods.len(), 2);
        assert_eq!(estimate.foods[1].name, "steamed broccoli");
        assert_eq!(estimate.confidence, Confidence::High);
        assert!(!estimate.needs_more_info);
        assert!((estimate.total_carbs - 6.5).abs() < 1e-9);
    }

    #[test]
    fn total_is_recomputed_from_foods() {
        let text = r#"{"foods":[
            {"name":"rice","quantity":"1 cup","carbs_per_100g":28,"estimated_carbs":44.5,"confidence":"medium"},
            {"name":"beans","quantity":"1/2 cup","carbs_per_100g":20,"estimated_carbs":20.25,"confidence":"medium"}
        ],"total_carbs":70,"confidence":"medium","needs_more_info":false}"#;
        let estimate = interpret(text, "rice and beans", true);
        let sum: f64 = estimate.foods.iter().map(|f| f.estimated_carbs).sum();
        assert!((estimate.total_carbs - sum).abs() < 1e-9);
        assert!((estimate.total_carbs - 64.75).abs() < 1e-9);
    }

    #[test]
    fn prose_without_json_yields_fallback() {
        let estimate = interpret("I think that is about 40 grams of carbs.", "pasta", true);
        assert_is_fallback(&estimate);
        assert!(estimate.foods[0].name.contains("about 40 grams"));
    }

    #[test]
    fn malformed_json_yields_fallback() {
        let estimate = interpret("{\"foods\": [ {\"name\": }", "pasta", true);
        assert_is_fallback(&estimate);
    }

    #[test]
    fn fallback_ignores_clarification_permission() {
        assert_is_fallback(&interpret("nothing useful", "pasta", false));
    }

    #[test]
    fn empty_food_list_yields_fallback() {
        let estimate = interpret(r#"{"foods":[],"total_carbs":0,"confidence":"high"}"#, "air", true);
        assert_is_fallback(&estimate);
    }

    #[test]
    fn negative_carbs_yield_fallback() {
        let text = r#"{"foods":[{"name":"x","quantity":"1","carbs_per_100g":1,"estimated_carbs":-3}]}"#;
        assert!(matches!(
            parse_structured(text, true),
            Err(ParseFailure::InvalidCarbs(name)) if name == "x"
        ));
        assert_is_fallback(&interpret(text, "x", true));
    }

    #[test]
    fn overflowing_total_yields_fallback() {
        let text = r#"{"foods":[{"name":"a","estimated_carbs":1e308},{"name":"b","estimated_carbs":1e308}]}"#;
        assert!(matches!(
            parse_structured(text, true),
            Err(ParseFailure::TotalOverflow)
        ));
        let estimate = interpret(text, "x", true);
        assert_is_fallback(&estimate);
        assert!(estimate.total_carbs.is_finite());
    }

    #[test]
    fn fallback_summary_uses_description_when_output_blank() {
        let estimate = fallback_estimate("   \n ", "a   bowl of  soup");
        assert_eq!(estimate.foods[0].name, "Unparsed estimate: a bowl of soup");
    }

    #[test]
    fn clarifications_kept_only_when_needed_and_permitted() {
        let text = r#"{"foods":[{"name":"potato","quantity":"1","carbs_per_100g":17,"estimated_carbs":30,"confidence":"low"}],
            "confidence":"low","clarifications":["How large was the potato?", "  "],"needs_more_info":true}"#;

        let asked = interpret(text, "a potato", true);
        assert!(asked.needs_more_info);
        assert_eq!(asked.clarifications, vec!["How large was the potato?".to_string()]);

        let silent = interpret(text, "a potato", false);
        assert!(!silent.needs_more_info);
        assert!(silent.clarifications.is_empty());
    }

    #[test]
    fn stray_clarifications_dropped_when_not_needed() {
        let text = r#"{"foods":[{"name":"apple","quantity":"1 medium","carbs_per_100g":14,"estimated_carbs":25,"confidence":"high"}],
            "confidence":"high","clarifications":["Was it large?"],"needs_more_info":false}"#;
        let estimate = interpret(text, "an apple", true);
        assert!(estimate.clarifications.is_empty());
    }

    #[test]
    fn missing_optional_fields_get_defaults() {
        let text = r#"{"foods":[{"name":"banana","estimated_carbs":27}]}"#;
        let estimate = parse_structured(text, true).unwrap();
        assert_eq!(estimate.foods[0].quantity, "unspecified");
        assert_eq!(estimate.foods[0].carbs_per_100g, 0.0);
        assert_eq!(estimate.foods[0].confidence, Confidence::Low);
        assert_eq!(estimate.confidence, Confidence::Low);
    }
}
