use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};

use multipost_core::Error;

use crate::types::StatusResponse;

/// Handler-level error: an HTTP status plus a human-readable message.
/// The default mapping from core error kinds can be overridden per call
/// site where a route's contract differs (e.g. `/verify_code` reports
/// generic transport failures as 400).
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, error: Error) -> Self {
        Self::new(status, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::new(status_for(&error), error.to_string())
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::CodeRequestFailed(_) => StatusCode::BAD_REQUEST,
        Error::SessionNotFound => StatusCode::NOT_FOUND,
        Error::PasswordRequired | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
        Error::NotAuthenticated | Error::AccountBanned => StatusCode::FORBIDDEN,
        Error::ForbiddenContent(_)
        | Error::ChannelResolutionFailed(_)
        | Error::MalformedInput { .. } => StatusCode::BAD_REQUEST,
        Error::PartialDelivery(_)
        | Error::UpstreamUnavailable(_)
        | Error::Transport(_)
        | Error::Timeout
        | Error::Config(_)
        | Error::Io(_)
        | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // No transport-level detail beyond a message string.
        (self.status, Json(StatusResponse::error(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_their_documented_statuses() {
        let cases = [
            (Error::CodeRequestFailed("x".into()), StatusCode::BAD_REQUEST),
            (Error::SessionNotFound, StatusCode::NOT_FOUND),
            (Error::PasswordRequired, StatusCode::UNAUTHORIZED),
            (Error::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (Error::NotAuthenticated, StatusCode::FORBIDDEN),
            (Error::AccountBanned, StatusCode::FORBIDDEN),
            (
                Error::ForbiddenContent(vec!["spam".into()]),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::malformed("schedule_date", "bad"),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::PartialDelivery(vec!["channel_1".into()]),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                Error::UpstreamUnavailable("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn aggregate_delivery_errors_name_every_failed_target() {
        let err = ApiError::from(Error::PartialDelivery(vec![
            "channel_1".into(),
            "newsroom".into(),
        ]));
        assert!(err.message().contains("channel_1"));
        assert!(err.message().contains("newsroom"));
    }
}
