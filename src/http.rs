use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::capability::{self, Capability, GateOutcome};
use crate::error::GatewayError;
use crate::models::{ChatRequestDraft, Session, UsageSnapshot};
use crate::repository::RedisStore;
use crate::service::{AccessDecision, AccessService};

type SharedService = Arc<AccessService<RedisStore>>;

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/access", post(access))
        .route("/v1/usage", post(usage))
        .route("/v1/gate", post(gate))
        .route("/v1/chat", post(chat))
        .layer(middleware::from_fn(cors))
        .with_state(service)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn access(
    State(service): State<SharedService>,
    Json(session): Json<Session>,
) -> Json<AccessDecision> {
    Json(service.access_decision(&session).await)
}

async fn usage(
    State(service): State<SharedService>,
    Json(session): Json<Session>,
) -> Result<Json<Option<UsageSnapshot>>, ApiError> {
    let snapshot = service.usage_snapshot(&session).await.map_err(ApiError)?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct GateRequest {
    /// Absent while the caller's permission data is still resolving.
    session: Option<Session>,
    required: Capability,
    #[serde(default)]
    fallback: Option<String>,
}

async fn gate(Json(request): Json<GateRequest>) -> Json<GateOutcome> {
    Json(capability::evaluate(
        request.session.as_ref(),
        request.required,
        request.fallback.as_deref(),
    ))
}

async fn chat(
    State(service): State<SharedService>,
    Json(draft): Json<ChatRequestDraft>,
) -> Result<Json<Value>, ApiError> {
    service
        .dispatch_chat(draft)
        .await
        .map(Json)
        .map_err(ApiError)
}

struct ApiError(GatewayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::Transport(_) | GatewayError::EmptyResponse => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"message": self.0.to_string()}))).into_response()
    }
}

/// Answer pre-flight requests directly and stamp every response, success or
/// error, with the same permissive header set plus a JSON content type.
async fn cors(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, content-type"),
    );
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_headers_applied_to_every_response() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_cors_does_not_override_existing_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        apply_cors_headers(&mut headers);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
    }

    #[test]
    fn test_dispatch_failures_map_to_bad_gateway() {
        let response = ApiError(GatewayError::Transport("rate limited".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let response = ApiError(GatewayError::EmptyResponse).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let response = ApiError(GatewayError::Lookup("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
