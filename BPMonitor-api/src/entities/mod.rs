// Public entities for the BP Monitor API
// Request and response shapes that only exist at the HTTP boundary

// Error and success envelopes
pub mod common;

// Auth responses
pub mod auth;

// Reading, analytics and alert payloads
pub mod readings;

pub use common::{ApiJson, ApiPath, ApiQuery, ErrorResponse, SuccessResponse};
