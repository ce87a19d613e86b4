use service_core::error::AppError;
use thiserror::Error;

pub const DAILY_LIMIT_REACHED: &str = "DAILY_LIMIT_REACHED";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error, missing information")]
    MissingInformation,

    #[error("Model {0} not found")]
    ModelNotFound(String),

    #[error("Daily message limit reached ({count}/{limit})")]
    DailyLimitReached { limit: u32, count: u32 },

    #[error("You must log in to use this model")]
    LoginRequired,

    #[error("Chat {0} not found")]
    ChatNotFound(String),

    #[error("Invalid preferences")]
    InvalidPreferences,
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MissingInformation | ChatError::InvalidPreferences => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            // Unknown models are a server-side misconfiguration, not a client error.
            ChatError::ModelNotFound(id) => {
                AppError::InternalError(anyhow::anyhow!("Model {} not found", id))
            }
            ChatError::DailyLimitReached { limit, count } => AppError::LimitExceeded {
                code: DAILY_LIMIT_REACHED,
                message: "Daily message limit reached".to_string(),
                limit,
                count,
            },
            ChatError::LoginRequired => AppError::Unauthorized(anyhow::anyhow!(err.to_string())),
            ChatError::ChatNotFound(_) => AppError::NotFound(anyhow::anyhow!(err.to_string())),
        }
    }
}
