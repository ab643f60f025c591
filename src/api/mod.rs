//! API layer - HTTP handlers and routing
//!
//! - `POST /graphql` and `GET /graphql` (GraphiQL)
//! - `GET /graphql/ws` for subscriptions
//! - `POST /webhooks/stripe`
//! - `GET /health`

pub mod graphql;
pub mod middleware;
pub mod webhooks;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.backend.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::internal_error("Database unavailable")
    })?;
    Ok(Json(json!({
        "status": "ok",
        "database": state.backend.driver(),
    })))
}

/// Build the API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let graphql_routes = Router::new()
        .route("/graphql", get(graphql::graphiql).post(graphql::graphql_handler))
        .route_layer(axum_middleware::from_fn_with_state(state, middleware::optional_auth));

    Router::new()
        .merge(graphql_routes)
        .route("/graphql/ws", get(graphql::graphql_ws))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/health", get(health))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Ok(build_api_router(state.clone())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Backend;
    use crate::graphql::build_schema;
    use crate::services::test_support::{intent_json, TestEnv};
    use axum::http::{HeaderName, StatusCode};
    use axum_test::TestServer;

    fn server(env: &TestEnv) -> TestServer {
        let state = AppState {
            schema: build_schema(env.services.clone()),
            services: env.services.clone(),
            backend: Backend::Memory(env.repos.clone()),
        };
        TestServer::new(build_router(state, "http://localhost:3000").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let env = TestEnv::new();
        let response = server(&env).get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "memory");
    }

    #[tokio::test]
    async fn test_graphql_uses_bearer_token() {
        let env = TestEnv::new();
        let bob = env.user("bob").await;
        let server = server(&env);

        let anonymous: Value = server
            .post("/graphql")
            .json(&json!({ "query": "{ me { name } }" }))
            .await
            .json();
        assert!(anonymous["data"]["me"].is_null());

        let authenticated: Value = server
            .post("/graphql")
            .authorization_bearer(env.token(&bob))
            .json(&json!({ "query": "{ me { name email } }" }))
            .await
            .json();
        assert_eq!(authenticated["data"]["me"]["name"], "bob");
        assert_eq!(authenticated["data"]["me"]["email"], "bob@example.org");
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let env = TestEnv::new();
        let response = server(&env).get("/graphql").await;
        response.assert_status_ok();
        assert!(response.text().contains("graphiql"));
    }

    #[tokio::test]
    async fn test_webhook_signature_is_checked() {
        let env = TestEnv::new();
        let server = server(&env);
        let signature = HeaderName::from_static("stripe-signature");

        let missing = server.post("/webhooks/stripe").bytes("{}".into()).await;
        missing.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = missing.json();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let forged = server
            .post("/webhooks/stripe")
            .add_header(signature, HeaderValue::from_static("t=1,v1=deadbeef"))
            .bytes("{}".into())
            .await;
        forged.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_records_payment() {
        let env = TestEnv::new();
        let server = server(&env);

        let intent = env
            .services
            .payments
            .create_payment_intent(
                None,
                crate::models::CreatePaymentIntentInput {
                    amount: 700,
                    currency: None,
                    campaign_id: None,
                    name: "Grace".into(),
                    email: "grace@example.org".into(),
                    message: None,
                    anonymous: None,
                },
            )
            .await
            .unwrap();
        env.gateway.succeed(&intent.payment_intent_id).await;
        let paid = env.gateway.intent(&intent.payment_intent_id).await;
        let (body, signature) = TestEnv::webhook("payment_intent.succeeded", intent_json(&paid));

        let response = server
            .post("/webhooks/stripe")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .bytes(body.into())
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["received"], true);

        let donors = env.repos.donors.find(crate::db::Query::new(crate::db::Filter::all())).await.unwrap();
        assert_eq!(donors[0].total_donations, 700);
    }
}
