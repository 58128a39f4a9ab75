use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Failure modes surfaced to the presentation layer.
///
/// Business-rule violations carry a user-facing message; persistence failures
/// are logged here at the boundary and reduced to a generic retry message so
/// no query text or driver detail leaks to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Username already exists")]
    DuplicateUser,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Note not found")]
    NotFoundOrForbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::DuplicateUser => (StatusCode::CONFLICT, self.to_string()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFoundOrForbidden => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Store(e) => {
                error!(error = %e, "request failed on persistence layer");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong, please try again".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_keep_their_message() {
        assert_eq!(
            ApiError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
        assert_eq!(ApiError::DuplicateUser.to_string(), "Username already exists");
    }

    #[test]
    fn store_errors_map_to_500() {
        let err = ApiError::from(sqlx::Error::PoolClosed);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_and_forbidden_are_indistinguishable() {
        let response = ApiError::NotFoundOrForbidden.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
