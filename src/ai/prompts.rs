use serde_json::{json, Map, Value};

use super::types::CopyRequest;
use crate::billing::PlanFeatures;

/// Name of the structured output schema sent with every request
pub const SCHEMA_NAME: &str = "ad_copy";

/// System prompt for ad copy generation
pub const COPY_SYSTEM_PROMPT: &str = r#"You are AnuncIA, a senior direct-response copywriter for small online sellers.

RULES:
1. Write in the same language as the product description (default: Brazilian Portuguese)
2. The title is a scroll-stopping hook, at most 60 characters
3. The body sells benefits, not features, in 2-4 short sentences
4. The call to action is one imperative sentence
5. Never invent prices, discounts, certifications or guarantees that were not given
6. No hashtags, no emoji walls: at most two emoji in the whole ad
7. Respond ONLY with JSON matching the provided schema"#;

/// Build user prompt for one ad
pub fn build_copy_prompt(request: &CopyRequest, features: PlanFeatures) -> String {
    let mut prompt = String::from("Create an ad for this product.\n");

    if let Some(name) = non_blank(&request.product_name) {
        prompt.push_str(&format!("\nPRODUCT: {}", name));
    }
    prompt.push_str(&format!(
        "\nDESCRIPTION:\n---\n{}\n---",
        request.product_description.trim()
    ));
    if let Some(audience) = non_blank(&request.target_audience) {
        prompt.push_str(&format!("\nTARGET AUDIENCE: {}", audience));
    }
    if let Some(tone) = non_blank(&request.tone) {
        prompt.push_str(&format!("\nTONE: {}", tone));
    }
    if let Some(platform) = non_blank(&request.platform) {
        prompt.push_str(&format!("\nPLATFORM: {}", platform));
    }

    if features.audience_suggestions {
        prompt.push_str("\n\nAlso suggest 3 specific audiences worth targeting with paid ads.");
    }
    if features.video_script {
        prompt.push_str(
            "\n\nAlso write a 15-30 second vertical video script: an opening hook line, \
             3-5 scene descriptions, and a closing line.",
        );
    }

    prompt
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn string_field(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn string_array_field(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

/// Strict JSON schema for the fields this tier is entitled to
///
/// Strict mode requires every property to be listed in `required` and
/// `additionalProperties: false` on every object.
pub fn build_copy_schema(features: PlanFeatures) -> Value {
    let mut properties = Map::new();
    properties.insert("title".to_string(), string_field("Hook title, max 60 characters"));
    properties.insert("body".to_string(), string_field("Persuasive body copy"));
    properties.insert("call_to_action".to_string(), string_field("One-sentence call to action"));

    if features.audience_suggestions {
        properties.insert(
            "audience_suggestions".to_string(),
            string_array_field("Audiences to target"),
        );
    }

    if features.video_script {
        properties.insert(
            "video_script".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "hook": string_field("Opening line, first 3 seconds"),
                    "scenes": string_array_field("Scene descriptions in order"),
                    "closing": string_field("Closing line with the call to action")
                },
                "required": ["hook", "scenes", "closing"],
                "additionalProperties": false
            }),
        );
    }

    let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
