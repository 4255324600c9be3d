use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// The caller's bearer token, opaque to the gateway and forwarded to the
/// moderation/linking backend.
#[derive(Clone, Debug)]
pub struct Bearer(pub String);

/// Require a bearer token on every protected route and stash it in the
/// request extensions.
pub async fn require_bearer(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(unauthorized)?;
    req.extensions_mut().insert(Bearer(token));
    Ok(next.run(req).await)
}

/// Extract the bearer token from `headers`, if present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn unauthorized() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "missing or invalid authorization token",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = value {
            map.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn extracts_well_formed_bearer_tokens() {
        assert_eq!(
            bearer_token(&headers(Some("Bearer abc123"))),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert_eq!(bearer_token(&headers(None)), None);
        assert_eq!(bearer_token(&headers(Some("abc123"))), None);
        assert_eq!(bearer_token(&headers(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&headers(Some("Bearer "))), None);
    }
}
