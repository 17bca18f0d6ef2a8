//! HTTP transport
//!
//! `GET /` reports liveness. `POST /chat` runs one turn: the body is
//! `{"message": "...", "conversation_id": "..."}` (id optional) and the reply
//! is `{"response": "...", "conversation_id": "..."}`. Clients keep sending
//! the returned id to continue the same conversation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::desk::AirlineDesk;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the API router
pub fn create_router(desk: Arc<AirlineDesk>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .route("/chat", post(chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(desk)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "online" }))
}

async fn chat(
    State(desk): State<Arc<AirlineDesk>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let reply = desk
        .respond(request.conversation_id.as_deref(), &request.message)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ChatResponse {
        response: reply.response,
        conversation_id: reply.conversation_id,
    }))
}

enum AppError {
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
