use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use sprout_services::Error;

/// Handler error: a service failure mapped onto an HTTP status.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::UserExists | Error::AddressInUse { .. } => StatusCode::CONFLICT,
            Error::NoUser
            | Error::InvalidPassword
            | Error::InvalidToken
            | Error::ExpiredToken
            | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) | Error::NoDevice(_) | Error::NoTelemetry(_) => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::PasswordHash(_)
            | Error::Template(_)
            | Error::Email(_)
            | Error::ResetCleanup(_)
            | Error::Persistence { .. }
            | Error::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            // internals stay in the log
            error!("request failed: {:#}", anyhow::Error::new(self));
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (ApiError::from(Error::UserExists), StatusCode::CONFLICT),
            (ApiError::from(Error::InvalidPassword), StatusCode::UNAUTHORIZED),
            (ApiError::from(Error::ExpiredToken), StatusCode::UNAUTHORIZED),
            (ApiError::from(Error::Unauthenticated), StatusCode::UNAUTHORIZED),
            (ApiError::from(Error::NotFound("device")), StatusCode::NOT_FOUND),
            (ApiError::from(Error::NoTelemetry(3)), StatusCode::NOT_FOUND),
            (
                ApiError::from(Error::AddressInUse {
                    mac_addr: "AA".into(),
                    device_id: 1,
                }),
                StatusCode::CONFLICT,
            ),
            (ApiError::from(Error::InvalidInput("x")), StatusCode::BAD_REQUEST),
            (
                ApiError::from(Error::Persistence {
                    op: "get_user",
                    source: anyhow::anyhow!("disk gone"),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let response = ApiError::from(Error::Persistence {
            op: "get_user",
            source: anyhow::anyhow!("disk gone"),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
