pub const SYSTEM_PROMPT: &str = r#"You are a nutrition assistant that estimates carbohydrates in meals.
Respond with a single JSON object and nothing else, using exactly this shape:
{
  "foods": [
    {
      "name": "string",
      "quantity": "amount with unit, e.g. 1 cup or 150 g",
      "carbs_per_100g": number,
      "estimated_carbs": number,
      "confidence": "high" | "medium" | "low"
    }
  ],
  "total_carbs": number,
  "confidence": "high" | "medium" | "low",
  "clarifications": ["string"],
  "needs_more_info": boolean
}
All carbohydrate values are grams and must be non-negative.
"total_carbs" must equal the sum of every food's "estimated_carbs"."#;

const CLARIFICATION_GUIDANCE: &str = "If the portion size, the preparation method or any \
sauces and condiments are not specified, set \"needs_more_info\" to true and list short \
clarifying questions in \"clarifications\".";

const NO_CLARIFICATION_GUIDANCE: &str = "Do not ask questions. Assume typical portions and \
preparation, set \"needs_more_info\" to false and leave \"clarifications\" empty.";

pub fn user_prompt(description: &str, allow_clarifications: bool) -> String {
    let guidance = if allow_clarifications {
        CLARIFICATION_GUIDANCE
    } else {
        NO_CLARIFICATION_GUIDANCE
    };
    format!(
        "Analyze this meal and estimate its carbohydrates: \"{description}\"\n\n\
         1. Identify each food item in the description.\n\
         2. Estimate portion sizes from typical serving descriptions.\n\
         3. Estimate carbohydrates per 100 g and for the stated portion.\n\
         4. Rate your confidence for each item and overall.\n\n\
         {guidance}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_description() {
        let prompt = user_prompt("two slices of rye toast", true);
        assert!(prompt.contains("\"two slices of rye toast\""));
    }

    #[test]
    fn clarification_guidance_follows_permission() {
        assert!(user_prompt("a potato", true).contains("needs_more_info\" to true"));
        let strict = user_prompt("a potato", false);
        assert!(strict.contains("Do not ask questions"));
        assert!(!strict.contains("needs_more_info\" to true"));
    }

    #[test]
    fn system_prompt_names_every_field() {
        for field in [
            "foods",
            "total_carbs",
            "confidence",
            "clarifications",
            "needs_more_info",
            "carbs_per_100g",
            "estimated_carbs",
        ] {
            assert!(SYSTEM_PROMPT.contains(field), "missing {field}");
        }
    }
}
