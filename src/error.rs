//! Application error type shared by the store modules and the routes layer.
//!
//! Every variant is recoverable at the calling layer; handlers convert them
//! to JSON error responses via `IntoResponse`.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;

use crate::routes::ErrorResponse;

/// The primary error type for all store operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced entity id does not exist (entity kind, id).
    #[error("{0} not found with id {1}")]
    NotFound(&'static str, i64),

    /// Attempted mutation of the default category.
    #[error("the default category cannot be modified")]
    Protected,

    /// Category name collision (case-sensitive exact match).
    #[error("category name already in use: {0}")]
    DuplicateName(String),

    /// A reply targets a comment that belongs to a different post.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Submission attempted on a post whose comment gate is closed.
    #[error("commenting is disabled for this post")]
    CommentingDisabled,

    /// Underlying storage failure; multi-row mutations roll back before
    /// this surfaces.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// A specialized Result for store operations.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Protected => StatusCode::FORBIDDEN,
            AppError::DuplicateName(_) => StatusCode::CONFLICT,
            AppError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            AppError::CommentingDisabled => StatusCode::FORBIDDEN,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the log, not in the client response.
        if let AppError::Storage(ref e) = self {
            tracing::error!("storage error: {}", e);
            return (
                status,
                Json(ErrorResponse {
                    error: "Database error".to_string(),
                    message: None,
                }),
            )
                .into_response();
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                message: None,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::NotFound("post", 7).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Protected.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::DuplicateName("Default".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::CommentingDisabled.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_display_includes_id() {
        let e = AppError::NotFound("comment", 42);
        assert_eq!(e.to_string(), "comment not found with id 42");
    }
}
