use crate::models::UserPreferences;
use serde::{Deserialize, Serialize};

/// Preferences as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferencesView {
    pub layout: String,
    pub prompt_suggestions: bool,
    pub show_tool_invocations: bool,
    pub show_conversation_previews: bool,
    pub multi_model_enabled: bool,
    pub hidden_models: Vec<String>,
}

impl From<UserPreferences> for PreferencesView {
    fn from(prefs: UserPreferences) -> Self {
        Self {
            layout: prefs.layout,
            prompt_suggestions: prefs.prompt_suggestions,
            show_tool_invocations: prefs.show_tool_invocations,
            show_conversation_previews: prefs.show_conversation_previews,
            multi_model_enabled: prefs.multi_model_enabled,
            hidden_models: prefs.hidden_models,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreferencesUpdated {
    pub success: bool,
    #[serde(flatten)]
    pub preferences: PreferencesView,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteModelsBody {
    pub favorite_models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteModelsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub favorite_models: Vec<String>,
}
