//! Bearer credential extraction from the `Authorization` header.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use crate::error::AuthError;

/// Extracts the bearer credential from the `Authorization` header.
///
/// # Errors
/// Returns [`AuthError::MissingCredential`] if the header is absent and
/// [`AuthError::InvalidToken`] if it is not a non-empty `Bearer` credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    value
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::invalid_token("authorization header is not a bearer token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            bearer_token(&HeaderMap::new()).unwrap_err(),
            AuthError::MissingCredential
        );
    }

    #[test]
    fn test_non_bearer_header_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "Bearer", "abc.def.ghi"] {
            let headers = headers_with(value);
            let err = bearer_token(&headers).unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken { .. }), "{value}");
        }
    }
}
