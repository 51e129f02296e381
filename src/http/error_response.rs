//! Maps the crate-wide `Error` onto the wire shape every endpoint returns on
//! failure (§6, §7): `{detail, status_code, error_code}` with the status
//! chosen once here rather than re-derived at each handler.

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    status_code: u16,
    error_code: &'static str,
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Error::Auth(_) => (StatusCode::UNAUTHORIZED, "auth_error"),
            Error::Authz(_) => (StatusCode::FORBIDDEN, "ownership_error"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Error::UpstreamProvider(_) => (StatusCode::BAD_GATEWAY, "upstream_provider_error"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            Error::Tool(_) => (StatusCode::INTERNAL_SERVER_ERROR, "tool_error"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "upstream_provider_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody { detail: self.to_string(), status_code: status.as_u16(), error_code: code };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_error_maps_to_403() {
        let (status, _) = Error::authz("not yours").status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_maps_to_404() {
        let (status, _) = Error::not_found("session").status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_400() {
        let (status, _) = Error::validation("bad input").status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
