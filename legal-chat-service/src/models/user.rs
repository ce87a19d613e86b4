use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account row. Guests are created anonymous and never premium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub anonymous: bool,
    pub premium: bool,
    #[serde(default)]
    pub favorite_models: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn guest(id: &str, default_model: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
            anonymous: true,
            premium: false,
            favorite_models: vec![default_model.to_string()],
            created_at: Utc::now(),
        }
    }
}

pub const DEFAULT_LAYOUT: &str = "fullscreen";

/// UI preferences, one document per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    pub layout: String,
    pub prompt_suggestions: bool,
    pub show_tool_invocations: bool,
    pub show_conversation_previews: bool,
    pub multi_model_enabled: bool,
    pub hidden_models: Vec<String>,
}

impl UserPreferences {
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            layout: DEFAULT_LAYOUT.to_string(),
            prompt_suggestions: true,
            show_tool_invocations: true,
            show_conversation_previews: true,
            multi_model_enabled: false,
            hidden_models: Vec::new(),
        }
    }

    /// Overlay the fields present in `patch`.
    pub fn apply(&mut self, patch: PreferencesPatch) {
        if let Some(layout) = patch.layout {
            self.layout = layout;
        }
        if let Some(v) = patch.prompt_suggestions {
            self.prompt_suggestions = v;
        }
        if let Some(v) = patch.show_tool_invocations {
            self.show_tool_invocations = v;
        }
        if let Some(v) = patch.show_conversation_previews {
            self.show_conversation_previews = v;
        }
        if let Some(v) = patch.multi_model_enabled {
            self.multi_model_enabled = v;
        }
        if let Some(models) = patch.hidden_models {
            self.hidden_models = models;
        }
    }
}

/// Partial preferences update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreferencesPatch {
    pub layout: Option<String>,
    pub prompt_suggestions: Option<bool>,
    pub show_tool_invocations: Option<bool>,
    pub show_conversation_previews: Option<bool>,
    pub multi_model_enabled: Option<bool>,
    pub hidden_models: Option<Vec<String>>,
}
