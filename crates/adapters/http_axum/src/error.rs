//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use momentary_domain::error::MomentaryError;
use momentary_domain::id::EmptyUniqueId;
use momentary_domain::service::UnknownService;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps request and domain failures to an HTTP response.
pub enum ApiError {
    /// Anything the registry or the setup service reported.
    Domain(MomentaryError),
    /// The request itself made no sense.
    BadRequest(String),
}

impl From<MomentaryError> for ApiError {
    fn from(err: MomentaryError) -> Self {
        Self::Domain(err)
    }
}

impl From<UnknownService> for ApiError {
    fn from(err: UnknownService) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<EmptyUniqueId> for ApiError {
    fn from(err: EmptyUniqueId) -> Self {
        Self::BadRequest(err.to_string())
    }
}

fn describe(err: &dyn std::error::Error) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Domain(err @ MomentaryError::Config(_)) => {
                (StatusCode::BAD_REQUEST, describe(err))
            }
            Self::Domain(err @ (MomentaryError::Migration(_) | MomentaryError::Removed(_))) => {
                (StatusCode::CONFLICT, describe(err))
            }
            Self::Domain(MomentaryError::NotFound(err)) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Domain(MomentaryError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentary_domain::error::{ConfigError, NotFoundError, RemovedError};

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn should_map_domain_errors_to_status_codes() {
        let not_found = MomentaryError::from(NotFoundError {
            entity: "Switch",
            id: "x".to_string(),
        });
        assert_eq!(status(not_found), StatusCode::NOT_FOUND);
        assert_eq!(
            status(MomentaryError::from(ConfigError::EmptyName)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(MomentaryError::from(RemovedError("x".to_string()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(MomentaryError::Storage("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_map_unknown_service_to_bad_request() {
        let err = "explode".parse::<momentary_domain::service::Service>().unwrap_err();
        assert_eq!(status(err), StatusCode::BAD_REQUEST);
    }
}
