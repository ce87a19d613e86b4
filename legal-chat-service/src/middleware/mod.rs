pub mod metrics;
pub mod user;

pub use metrics::metrics_middleware;
pub use user::{UserId, USER_ID_HEADER};
