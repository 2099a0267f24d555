//! Conversation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::ids::ConversationId;
use crate::common::pagination::{PageLimits, PageParams, PageQuery};
use crate::conversation::{
    ConfigOutcome, Conversation, ConversationPage, ConversationView, DeleteOutcome, SendOutcome,
};

use super::error::{ApiError, ApiResult};
use super::routes::Data;
use super::state::AppState;

/// Body of `POST /api/v1/conversations`; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversation {
    /// Requested id; generated when absent.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /api/v1/conversations/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessage {
    /// User message.
    pub content: String,
    /// Model to use from now on.
    #[serde(default)]
    pub model: Option<String>,
}

fn parse_id(raw: &str) -> ApiResult<ConversationId> {
    Ok(ConversationId::new(raw)?)
}

/// `GET /api/v1/conversations`
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<ConversationPage>> {
    let Query(query) = query?;
    let params = PageParams::from_query(query, PageLimits::CONVERSATIONS)?;
    Ok(Json(state.conversations.list(params).await?))
}

/// `POST /api/v1/conversations`
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Data<Conversation>>)> {
    let request: CreateConversation = if body.iter().all(u8::is_ascii_whitespace) {
        CreateConversation::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| ApiError::Validation(err.to_string()))?
    };

    let conversation = state
        .conversations
        .create(request.conversation_id, request.name)
        .await?;
    Ok((StatusCode::CREATED, Json(Data::new(conversation))))
}

/// `GET /api/v1/conversations/{id}`
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Data<ConversationView>>> {
    let id = parse_id(&id)?;
    let Query(query) = query?;
    let params = PageParams::from_query(query, PageLimits::MESSAGES)?;
    Ok(Json(Data::new(state.conversations.get(id, params).await)))
}

/// `DELETE /api/v1/conversations/{id}`
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Data<DeleteOutcome>>> {
    let id = parse_id(&id)?;
    Ok(Json(Data::new(state.conversations.delete(id).await)))
}

/// `POST /api/v1/conversations/{id}/messages`
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<SendMessage>, JsonRejection>,
) -> ApiResult<Json<Data<SendOutcome>>> {
    let id = parse_id(&id)?;
    let Json(request) = body?;
    let outcome = state
        .conversations
        .send_message(id, request.content, request.model)
        .await?;
    Ok(Json(Data::new(outcome)))
}

/// `POST /api/v1/conversations/{id}/set_config`
pub async fn set_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<Data<ConfigOutcome>>> {
    let id = parse_id(&id)?;
    let Json(config) = body?;
    let outcome = state.conversations.set_config(id, config).await?;
    Ok(Json(Data::new(outcome)))
}
