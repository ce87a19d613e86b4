//! Model catalog entries.

use serde::{Deserialize, Serialize};

pub const FLASH_MODEL_ID: &str = "gemini-2.5-flash";
pub const PRO_MODEL_ID: &str = "gemini-2.5-pro";

/// Quota tier a model belongs to. Pro models count against an extra
/// sub-ceiling on top of the user's general daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Free,
    Pro,
}

/// Provider-side generation defaults applied to every call of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    #[serde(default)]
    pub include_thoughts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub provider: String,
    /// Identifier sent to the provider API.
    pub provider_id: String,
    pub description: String,
    pub context_window: u32,
    pub vision: bool,
    pub web_search: bool,
    pub tools: bool,
    pub reasoning: bool,
    pub tier: ModelTier,
    /// Whether signed-out users may chat with this model.
    pub anonymous_allowed: bool,
    #[serde(default)]
    pub defaults: GenerationDefaults,
}

impl ModelConfig {
    pub fn is_pro(&self) -> bool {
        self.tier == ModelTier::Pro
    }
}

/// The models this deployment serves.
pub fn builtin_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: FLASH_MODEL_ID.to_string(),
            name: "Gemini 2.5 Flash".to_string(),
            provider: "google".to_string(),
            provider_id: FLASH_MODEL_ID.to_string(),
            description: "Fast answers with Google Search grounding".to_string(),
            context_window: 1_048_576,
            vision: true,
            web_search: true,
            tools: true,
            reasoning: false,
            tier: ModelTier::Free,
            anonymous_allowed: true,
            defaults: GenerationDefaults {
                temperature: Some(0.3),
                ..GenerationDefaults::default()
            },
        },
        ModelConfig {
            id: PRO_MODEL_ID.to_string(),
            name: "Gemini 2.5 Pro".to_string(),
            provider: "google".to_string(),
            provider_id: PRO_MODEL_ID.to_string(),
            description: "Deep legal analysis with visible reasoning".to_string(),
            context_window: 1_048_576,
            vision: true,
            web_search: true,
            tools: true,
            reasoning: true,
            tier: ModelTier::Pro,
            anonymous_allowed: true,
            defaults: GenerationDefaults {
                temperature: Some(0.3),
                top_p: Some(0.9),
                top_k: Some(40),
                max_output_tokens: Some(2048),
                stop_sequences: vec!["\nEND".to_string(), "\nДжерела:".to_string()],
                thinking_budget: Some(4096),
                include_thoughts: true,
            },
        },
    ]
}
