use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Absent when no database is configured; the service then keeps all
    /// state in memory.
    pub mongodb: Option<MongoConfig>,
    pub gemini: GeminiSettings,
    pub limits: UsageLimits,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    /// Server-held key. Empty means search and chat report "not configured".
    pub api_key: String,
    pub api_base: String,
    pub search_model: String,
    pub request_timeout_secs: u64,
}

impl GeminiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Daily message ceilings per account class.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UsageLimits {
    pub anonymous: u32,
    pub authenticated: u32,
    pub premium: u32,
    /// Separate ceiling for pro-tier models.
    pub pro: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            anonymous: 5,
            authenticated: 100,
            premium: 1000,
            pro: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    pub default_model: String,
    pub max_steps: usize,
    pub max_sources: usize,
    pub model_cache_ttl_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: crate::models::catalog::FLASH_MODEL_ID.to_string(),
            max_steps: 10,
            max_sources: 3,
            model_cache_ttl_secs: 300,
        }
    }
}

impl ChatSettings {
    pub fn model_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_secs)
    }
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| common.environment.clone()) == "prod";

        let defaults = UsageLimits::default();
        let chat_defaults = ChatSettings::default();

        let mongodb = match env::var("MONGODB_URI").ok().filter(|u| !u.is_empty()) {
            Some(uri) => Some(MongoConfig {
                uri,
                database: get_env("MONGODB_DATABASE", Some("legal_chat"), is_prod)?,
            }),
            None if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MONGODB_URI is required in production but not set"
                )))
            }
            None => None,
        };

        // Either variable name is accepted; the first one set wins.
        let api_key = env::var("GOOGLE_GENERATIVE_AI_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_default();

        Ok(ChatConfig {
            common,
            service_name: get_env("SERVICE_NAME", Some("legal-chat-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
            mongodb,
            gemini: GeminiSettings {
                api_key,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), false)?,
                search_model: get_env(
                    "GEMINI_SEARCH_MODEL",
                    Some(crate::models::catalog::FLASH_MODEL_ID),
                    false,
                )?,
                request_timeout_secs: parse_env("GEMINI_REQUEST_TIMEOUT_SECS", 120)?,
            },
            limits: UsageLimits {
                anonymous: parse_env("USAGE_ANONYMOUS_DAILY_LIMIT", defaults.anonymous)?,
                authenticated: parse_env("USAGE_AUTH_DAILY_LIMIT", defaults.authenticated)?,
                premium: parse_env("USAGE_PREMIUM_DAILY_LIMIT", defaults.premium)?,
                pro: parse_env("USAGE_PRO_DAILY_LIMIT", defaults.pro)?,
            },
            chat: ChatSettings {
                default_model: get_env(
                    "CHAT_DEFAULT_MODEL",
                    Some(&chat_defaults.default_model),
                    false,
                )?,
                max_steps: parse_env("CHAT_MAX_STEPS", chat_defaults.max_steps)?,
                max_sources: parse_env("CHAT_MAX_SOURCES", chat_defaults.max_sources)?,
                model_cache_ttl_secs: parse_env(
                    "MODEL_CACHE_TTL_SECS",
                    chat_defaults.model_cache_ttl_secs,
                )?,
            },
        })
    }

    /// Configuration for tests and local runs without a database or key.
    pub fn in_memory() -> Self {
        ChatConfig {
            common: core_config::Config::default(),
            service_name: "legal-chat-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            mongodb: None,
            gemini: GeminiSettings {
                api_key: String::new(),
                api_base: DEFAULT_GEMINI_API_BASE.to_string(),
                search_model: crate::models::catalog::FLASH_MODEL_ID.to_string(),
                request_timeout_secs: 120,
            },
            limits: UsageLimits::default(),
            chat: ChatSettings::default(),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_config_uses_documented_defaults() {
        let config = ChatConfig::in_memory();
        assert!(config.mongodb.is_none());
        assert_eq!(config.limits.anonymous, 5);
        assert_eq!(config.limits.authenticated, 100);
        assert_eq!(config.limits.pro, 150);
        assert_eq!(config.chat.max_steps, 10);
        assert_eq!(config.chat.model_cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn parse_env_reports_bad_numbers() {
        std::env::set_var("LEGAL_CHAT_TEST_BAD_NUMBER", "many");
        let result: Result<u32, AppError> = parse_env("LEGAL_CHAT_TEST_BAD_NUMBER", 3);
        assert!(matches!(result, Err(AppError::ConfigError(_))));

        let fallback: u32 = parse_env("LEGAL_CHAT_TEST_UNSET_NUMBER", 3).unwrap();
        assert_eq!(fallback, 3);
    }
}
