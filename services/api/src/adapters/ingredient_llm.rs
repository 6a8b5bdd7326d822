//! services/api/src/adapters/ingredient_llm.rs
//!
//! This module contains the adapter for the Ingredient-Analysis LLM.
//! It implements the `IngredientAnalysisService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use dermaglow_core::{
    domain::IngredientAnalysis,
    ports::{IngredientAnalysisService, PortError, PortResult},
};
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You are a dermatological ingredient analyst. Given the name of a \
skincare ingredient, respond with ONLY a JSON object (no prose, no markdown) with exactly these \
keys: \"rating\" (integer 1-10 measuring overall quality and evidence base), \"category\" (the \
ingredient class, e.g. humectant, retinoid, exfoliant), \"benefits\", \"how_to_use\", \
\"mechanism_of_action\", \"safety_usage_limit\", \"side_effects\", and \"suitable_skin_types\" \
(all strings, two to three sentences each). If the input is not a recognizable skincare \
ingredient, still fill every key, noting the uncertainty in the text fields and rating \
conservatively.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `IngredientAnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiIngredientAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiIngredientAdapter {
    /// Creates a new `OpenAiIngredientAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Wire Record Struct
//=========================================================================================

/// The JSON shape the model is instructed to produce.
#[derive(Deserialize)]
struct AnalysisRecord {
    rating: i64,
    category: String,
    benefits: String,
    how_to_use: String,
    mechanism_of_action: String,
    safety_usage_limit: String,
    side_effects: String,
    suitable_skin_types: String,
}

impl AnalysisRecord {
    fn to_domain(self) -> IngredientAnalysis {
        IngredientAnalysis {
            // Models occasionally wander out of range; the badge and summary
            // logic require 1..=10.
            rating: self.rating.clamp(1, 10) as u8,
            category: self.category,
            benefits: self.benefits,
            how_to_use: self.how_to_use,
            mechanism_of_action: self.mechanism_of_action,
            safety_usage_limit: self.safety_usage_limit,
            side_effects: self.side_effects,
            suitable_skin_types: self.suitable_skin_types,
        }
    }
}

/// Strips a markdown code fence from around the model's output, if present.
/// Models often wrap JSON in ```json ... ``` despite instructions not to.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let re = regex::Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$")
        .expect("fence pattern is valid");
    match re.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

fn parse_analysis(raw: &str) -> PortResult<IngredientAnalysis> {
    let record: AnalysisRecord = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| PortError::Unexpected(format!("Malformed analysis from LLM: {e}")))?;
    Ok(record.to_domain())
}

//=========================================================================================
// `IngredientAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IngredientAnalysisService for OpenAiIngredientAdapter {
    /// Produces a structured safety and efficacy report for a single ingredient.
    async fn analyze_ingredient(&self, ingredient: &str) -> PortResult<IngredientAnalysis> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("INGREDIENT: {ingredient}"))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Ingredient analysis LLM response contained no text content.".to_string(),
                )
            })?;

        parse_analysis(&content)
    }
}
