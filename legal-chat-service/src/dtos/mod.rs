pub mod chat;
pub mod preferences;
pub mod search;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}
