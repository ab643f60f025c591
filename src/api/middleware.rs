//! API middleware
//!
//! Shared application state, the JSON error body and bearer token
//! resolution. Authentication never rejects a request here: an absent or
//! invalid token simply yields an anonymous viewer, and resolvers decide.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::Backend;
use crate::graphql::{AppSchema, Viewer};
use crate::services::{ServiceError, Services};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub schema: AppSchema,
    pub services: Arc<Services>,
    pub backend: Backend,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        if let ServiceError::Internal(inner) = &err {
            tracing::error!(error = ?inner, "Internal error while handling a request");
        }
        Self::new(err.code(), err.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYMENT_ERROR" => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a token into the viewer; anything invalid is anonymous
pub async fn resolve_viewer(services: &Services, token: Option<&str>) -> Viewer {
    let Some(claims) = token.and_then(|t| services.users.claims_from_token(t)) else {
        return Viewer(None);
    };
    match services.users.user_from_claims(&claims).await {
        Ok(user) => Viewer(user),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load the token's user");
            Viewer(None)
        }
    }
}

/// Attach the viewer to the request extensions
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let viewer = resolve_viewer(&state.services, bearer_token(request.headers())).await;
    request.extensions_mut().insert(viewer);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_service_errors_map_to_codes() {
        let err = ApiError::from(ServiceError::not_found("Payment"));
        assert_eq!(err.error.code, "NOT_FOUND");
        assert_eq!(err.error.message, "Payment not found");

        let internal = ApiError::from(ServiceError::Internal(anyhow::anyhow!("secret detail")));
        assert_eq!(internal.error.message, "Internal server error");
        assert_eq!(internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_resolve_viewer() {
        let env = crate::services::test_support::TestEnv::new();
        let bob = env.user("bob").await;
        let token = env.token(&bob);

        let viewer = resolve_viewer(&env.services, Some(&token)).await;
        assert_eq!(viewer.0.map(|u| u.id), Some(bob.id));
        assert!(resolve_viewer(&env.services, Some("garbage")).await.0.is_none());
        assert!(resolve_viewer(&env.services, None).await.0.is_none());
    }
}
