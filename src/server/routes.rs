//! Route table for the chat agent API.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;

use super::conversations::{
    create_conversation, delete_conversation, get_conversation, list_conversations, send_message,
    set_config,
};
use super::error::ApiError;
use super::folders::{
    add_to_folder, create_folder, delete_folder, list_folders, remove_from_folder, rename_folder,
};
use super::state::AppState;
use super::tags::{add_tag, delete_tag, list_all_tags, list_tags, update_tag};

/// `{"data": ...}` response wrapper.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    /// Payload.
    pub data: T,
}

impl<T> Data<T> {
    /// Wrap a payload.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    let router = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/v1/conversations/",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/v1/conversations/{conversation_id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route(
            "/api/v1/conversations/{conversation_id}/messages",
            post(send_message),
        )
        .route(
            "/api/v1/conversations/{conversation_id}/set_config",
            post(set_config),
        )
        .route("/api/v1/folders", get(list_folders).post(create_folder))
        .route("/api/v1/folders/", get(list_folders).post(create_folder))
        .route(
            "/api/v1/folders/{folder_id}",
            patch(rename_folder).delete(delete_folder),
        )
        .route("/api/v1/folders/{folder_id}/add", post(add_to_folder))
        .route("/api/v1/folders/{folder_id}/remove", post(remove_from_folder))
        .route("/api/v1/conversation_tags", get(list_tags).post(add_tag))
        .route("/api/v1/conversation_tags/", get(list_tags).post(add_tag))
        .route("/api/v1/conversation_tags/all", get(list_all_tags))
        .route(
            "/api/v1/conversation_tags/{tag_id}",
            put(update_tag).delete(delete_tag),
        );

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(not_found),
    };

    router.with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}
