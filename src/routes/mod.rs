/**
 * Routes Module
 * API route handlers
 */
use serde::Serialize;

pub mod admin;
pub mod auth;
pub mod blog;
pub mod health;
pub mod upload;

/// Error response shared by every handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success response (for delete/approve style actions)
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}
