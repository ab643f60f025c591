//! GraphQL over HTTP and WebSocket

use async_graphql::http::{GraphiQLSource, ALL_WEBSOCKET_PROTOCOLS};
use async_graphql::Data;
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::{Html, IntoResponse, Response},
    Extension,
};

use super::middleware::{resolve_viewer, AppState};
use crate::graphql::Viewer;

pub async fn graphql_handler(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    state.schema.execute(request.into_inner().data(viewer)).await.into()
}

pub async fn graphiql() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/graphql/ws")
            .finish(),
    )
}

/// Token from the `connection_init` payload: `{"authorization": "Bearer ..."}`
fn init_token(payload: &serde_json::Value) -> Option<String> {
    let value = payload
        .get("authorization")
        .or_else(|| payload.get("Authorization"))?
        .as_str()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Subscriptions; the viewer is taken from the connection init payload
pub async fn graphql_ws(State(state): State<AppState>, protocol: GraphQLProtocol, upgrade: WebSocketUpgrade) -> Response {
    upgrade
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |stream| {
            let services = state.services.clone();
            GraphQLWebSocket::new(stream, state.schema.clone(), protocol)
                .on_connection_init(move |payload| async move {
                    let token = init_token(&payload);
                    let viewer = resolve_viewer(&services, token.as_deref()).await;
                    let mut data = Data::default();
                    data.insert(viewer);
                    Ok(data)
                })
                .serve()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_token() {
        assert_eq!(init_token(&json!({"authorization": "Bearer abc"})), Some("abc".into()));
        assert_eq!(init_token(&json!({"Authorization": "abc"})), Some("abc".into()));
        assert_eq!(init_token(&json!({"authorization": "Bearer "})), None);
        assert_eq!(init_token(&json!({})), None);
    }
}
