pub mod security_headers;
pub mod tracing;

pub use security_headers::security_headers_middleware;
pub use tracing::{ClientRequestId, REQUEST_ID_HEADER, request_id, request_id_middleware};
