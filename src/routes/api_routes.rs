use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::models::Conversation;
use crate::service::message_flow::MessageFlowController;

// ── Request / response bodies ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DemoModeRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub processing: bool,
    pub demo_mode: bool,
    pub active_conversation_id: Option<String>,
}

/// Conversation listing entry, without the message bodies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            message_count: c.messages.len(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

pub fn router(flow: MessageFlowController) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route(
            "/api/conversations",
            get(list_conversations_handler).post(new_conversation_handler),
        )
        .route("/api/conversations/{id}", get(get_conversation_handler))
        .route("/api/conversations/{id}/select", post(select_conversation_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/retry", post(retry_handler))
        .route("/api/demo", put(demo_mode_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(flow)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET `/api/status`
pub async fn status_handler(State(flow): State<MessageFlowController>) -> Json<StatusResponse> {
    Json(status(&flow))
}

fn status(flow: &MessageFlowController) -> StatusResponse {
    StatusResponse {
        processing: flow.is_processing(),
        demo_mode: flow.is_demo_mode(),
        active_conversation_id: flow.active_conversation_id(),
    }
}

/// GET `/api/conversations`
pub async fn list_conversations_handler(
    State(flow): State<MessageFlowController>,
) -> Json<Vec<ConversationSummary>> {
    Json(flow.conversations().iter().map(ConversationSummary::from).collect())
}

/// POST `/api/conversations` — start a new, empty conversation
pub async fn new_conversation_handler(State(flow): State<MessageFlowController>) -> Response {
    (StatusCode::CREATED, Json(flow.new_conversation())).into_response()
}

/// GET `/api/conversations/{id}`
pub async fn get_conversation_handler(
    Path(id): Path<String>,
    State(flow): State<MessageFlowController>,
) -> Response {
    match flow.conversation(&id) {
        Some(conversation) => Json(conversation).into_response(),
        None => error_response(&AppError::ConversationNotFound { id }),
    }
}

/// POST `/api/conversations/{id}/select`
pub async fn select_conversation_handler(
    Path(id): Path<String>,
    State(flow): State<MessageFlowController>,
) -> Response {
    if flow.select(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(&AppError::ConversationNotFound { id })
    }
}

/// POST `/api/chat` — run one turn against the active conversation
pub async fn chat_handler(
    State(flow): State<MessageFlowController>,
    Json(request): Json<ChatRequest>,
) -> Response {
    match flow.submit(&request.message).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => error_response(&err),
    }
}

/// POST `/api/retry` — re-ask the last question of the active conversation
pub async fn retry_handler(State(flow): State<MessageFlowController>) -> Response {
    match flow.retry().await {
        Ok(Some(outcome)) => Json(outcome).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

/// PUT `/api/demo`
pub async fn demo_mode_handler(
    State(flow): State<MessageFlowController>,
    Json(request): Json<DemoModeRequest>,
) -> Json<StatusResponse> {
    flow.set_demo_mode(request.enabled).await;
    Json(status(&flow))
}

// ── Helper ───────────────────────────────────────────────────────────────────

fn error_response(err: &AppError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::snapshot_repository::MemorySnapshotStore;
    use crate::service::activity::ProcessingIndicator;
    use crate::testing::ScriptedGateway;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<ScriptedGateway>, MessageFlowController) {
        let gateway = ScriptedGateway::new();
        let flow = MessageFlowController::new(
            gateway.clone(),
            Arc::new(ProcessingIndicator::new()),
            Arc::new(MemorySnapshotStore::new()),
            "test-agent",
        );
        (router(flow.clone()), gateway, flow)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn chat_returns_normalized_message() {
        let (app, gateway, _) = test_app();
        gateway.queue_reply(json!({
            "result": { "response": "Try HubSpot", "products": [{"name": "HubSpot CRM"}] }
        }));

        let (status, body) =
            send(&app, "POST", "/api/chat", Some(json!({ "message": "Find me a CRM" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["content"], "Try HubSpot");
        assert_eq!(body["message"]["products"][0]["name"], "HubSpot CRM");

        let (_, list) = send(&app, "GET", "/api/conversations", None).await;
        assert_eq!(list[0]["title"], "Find me a CRM");
        assert_eq!(list[0]["messageCount"], 2);
        assert_eq!(list[0]["id"], body["conversationId"]);
    }

    #[tokio::test]
    async fn blank_chat_is_bad_request() {
        let (app, _, flow) = test_app();
        let (status, body) = send(&app, "POST", "/api/chat", Some(json!({ "message": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("message"));
        assert!(flow.conversations().is_empty());
    }

    #[tokio::test]
    async fn failed_turn_then_retry() {
        let (app, gateway, _) = test_app();
        gateway.queue_error("agent down");
        gateway.queue_reply(json!({ "result": "Recovered" }));

        let (status, body) =
            send(&app, "POST", "/api/chat", Some(json!({ "message": "Find me a CRM" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["error"], true);

        let (status, body) = send(&app, "POST", "/api/retry", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["content"], "Recovered");
        assert!(body["message"].get("error").is_none());
    }

    #[tokio::test]
    async fn retry_with_nothing_to_retry_is_no_content() {
        let (app, _, _) = test_app();
        let (status, _) = send(&app, "POST", "/api/retry", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn conversation_lookup_and_selection() {
        let (app, _, _) = test_app();
        let (status, created) = send(&app, "POST", "/api/conversations", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, "GET", &format!("/api/conversations/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["sessionId"], created["sessionId"]);

        let (status, _) = send(&app, "POST", &format!("/api/conversations/{id}/select"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", "/api/conversations/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/api/conversations/missing/select", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn demo_toggle_reports_status() {
        let (app, _, _) = test_app();
        let (status, body) = send(&app, "PUT", "/api/demo", Some(json!({ "enabled": true }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["demoMode"], true);
        assert!(body["activeConversationId"].is_string());
        assert_eq!(body["processing"], false);

        let (_, body) = send(&app, "PUT", "/api/demo", Some(json!({ "enabled": false }))).await;
        assert_eq!(body["demoMode"], false);
        assert!(body["activeConversationId"].is_null());
    }
}
