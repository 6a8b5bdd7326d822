//! services/api/src/adapters/routine_llm.rs
//!
//! This module contains the adapter for the Routine-Generating LLM.
//! It implements the `RoutineGenerationService` port from the `core` crate.

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
    domain::{RoutineRequest, RoutineResponse, RoutineStep},
    ports::{PortError, PortResult, RoutineGenerationService},
};
use serde::Deserialize;

use super::ingredient_llm::strip_code_fence;

const SYSTEM_PROMPT: &str = "You are a dermatological routine planner. Given a skin type, a list \
of skin concerns, and a desired routine complexity, respond with ONLY a JSON object (no prose, \
no markdown) with exactly these keys: \"morning_routine\" and \"evening_routine\" (arrays of \
step objects), plus \"general_tips\", \"frequency_notes\", \"weekly_schedule\", and \
\"product_recommendations\" (strings, two to four sentences each). Each step object has \
\"step\" (integer order starting at 1), \"product_type\", \"product_name\", \"instructions\", \
\"benefits\", \"timing\" (all strings), and \"optional\" (boolean). Respect the requested \
complexity: a \"2-step\" routine has cleanser and moisturizer/SPF only, \"3-4-step\" adds a \
treatment, \"more-than-4-step\" may include serums, toners, and masks.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `RoutineGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiRoutineAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiRoutineAdapter {
    /// Creates a new `OpenAiRoutineAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct StepRecord {
    step: u32,
    product_type: String,
    product_name: String,
    instructions: String,
    benefits: String,
    timing: String,
    #[serde(default)]
    optional: bool,
}

impl StepRecord {
    fn to_domain(self) -> RoutineStep {
        RoutineStep {
            step: self.step,
            product_type: self.product_type,
            product_name: self.product_name,
            instructions: self.instructions,
            benefits: self.benefits,
            timing: self.timing,
            optional: self.optional,
        }
    }
}

/// The JSON shape the model is instructed to produce.
#[derive(Deserialize)]
struct RoutineRecord {
    morning_routine: Vec<StepRecord>,
    evening_routine: Vec<StepRecord>,
    general_tips: String,
    frequency_notes: String,
    weekly_schedule: String,
    product_recommendations: String,
}

impl RoutineRecord {
    fn to_domain(self) -> RoutineResponse {
        let collect_sorted = |records: Vec<StepRecord>| {
            let mut steps: Vec<RoutineStep> =
                records.into_iter().map(StepRecord::to_domain).collect();
            // Models usually emit steps in order, but the order field is the
            // contract, not the array position.
            steps.sort_by_key(|s| s.step);
            steps
        };

        RoutineResponse {
            morning_routine: collect_sorted(self.morning_routine),
            evening_routine: collect_sorted(self.evening_routine),
            general_tips: self.general_tips,
            frequency_notes: self.frequency_notes,
            weekly_schedule: self.weekly_schedule,
            product_recommendations: self.product_recommendations,
        }
    }
}

fn parse_routine(raw: &str) -> PortResult<RoutineResponse> {
    let record: RoutineRecord = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| PortError::Unexpected(format!("Malformed routine from LLM: {e}")))?;
    Ok(record.to_domain())
}

//=========================================================================================
// `RoutineGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RoutineGenerationService for OpenAiRoutineAdapter {
    /// Builds a full morning/evening routine for the requested skin profile.
    async fn generate_routine(&self, request: &RoutineRequest) -> PortResult<RoutineResponse> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "SKIN TYPE: {}\nCONCERNS: {}\nCOMPLEXITY: {}",
                    request.skin_type,
                    request.concerns.join(", "),
                    request.complexity.as_str(),
                ))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Routine generation LLM response contained no text content.".to_string(),
                )
            })?;

        parse_routine(&content)
    }
}
