//! Access gate.
//!
//! The upstream identity provider authenticates users and forwards the stable
//! user id in `x-user-id`. When a gateway key is configured the request must
//! also carry it; the key comparison is constant-time to mitigate timing attacks.
//! Everything except `/api/me` additionally requires allow-list membership.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::Identity;
use crate::AppState;

/// Header name for the gateway key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Check the gateway key and attach the caller's [`Identity`] to the request.
pub async fn identity_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all gateways (dev mode)
    if let Some(expected) = state.config.api_psk.as_deref() {
        if !gateway_key_matches(request.headers(), expected) {
            return reject(&state, AppError::Unauthorized("Missing or invalid API key".to_string()));
        }
    }

    let Some(uid) = user_id(request.headers()) else {
        return reject(&state, AppError::Unauthorized("Not signed in".to_string()));
    };

    request.extensions_mut().insert(Identity { uid });
    next.run(request).await
}

/// Reject callers whose identity is not on the allow-list.
///
/// Must run inside [`identity_layer`]. The list is read on every request, so
/// revocations take effect immediately.
pub async fn allow_list_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return reject(&state, AppError::Unauthorized("Not signed in".to_string()));
    };

    match state.repo.is_allowed(&identity.uid).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!(uid = %identity.uid, "access denied: not on allow-list");
            reject(
                &state,
                AppError::Forbidden(format!("User {} is not allowed", identity.uid)),
            )
        }
        Err(e) => reject(&state, e),
    }
}

fn gateway_key_matches(headers: &HeaderMap, expected: &str) -> bool {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            // Also accept the key as a bearer token
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        });

    match provided {
        Some(key) => constant_time_compare(key, expected),
        None => false,
    }
}

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn reject(state: &AppState, error: AppError) -> Response {
    AppErrorWithRevision {
        error,
        revision_id: state.repo.feed().current_revision(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_gateway_key_accepts_header_or_bearer() {
        let mut headers = HeaderMap::new();
        assert!(!gateway_key_matches(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(gateway_key_matches(&headers, "secret"));

        let mut bearer = HeaderMap::new();
        bearer.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(gateway_key_matches(&bearer, "secret"));
        assert!(!gateway_key_matches(&bearer, "other"));
    }

    #[test]
    fn test_user_id_ignores_blank_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(user_id(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" uid-42 "));
        assert_eq!(user_id(&headers).as_deref(), Some("uid-42"));
    }
}
