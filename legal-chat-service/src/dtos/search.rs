use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "Query is required"))]
    pub q: String,

    #[validate(range(min = 1, max = 10))]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitsQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,

    #[serde(default)]
    pub is_authenticated: bool,
}
