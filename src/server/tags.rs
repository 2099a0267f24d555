//! Conversation tag endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::common::ids::{ConversationId, TagId};
use crate::tags::{Tag, TagList};

use super::error::ApiResult;
use super::state::AppState;

/// Query of `GET /api/v1/conversation_tags`.
#[derive(Debug, Deserialize)]
pub struct TagFilter {
    /// Conversation whose tags are listed.
    pub conversation_id: ConversationId,
}

/// Body of `POST /api/v1/conversation_tags`.
#[derive(Debug, Deserialize)]
pub struct NewTag {
    /// Conversation to tag.
    pub conversation_id: ConversationId,
    /// Tag text.
    pub tag: String,
}

/// Body of `PUT /api/v1/conversation_tags/{id}`.
#[derive(Debug, Deserialize)]
pub struct TagText {
    /// New tag text.
    pub tag: String,
}

/// `GET /api/v1/conversation_tags?conversation_id=`
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TagFilter>, QueryRejection>,
) -> ApiResult<Json<TagList>> {
    let Query(filter) = query?;
    Ok(Json(state.tags.list_for(&filter.conversation_id).await?))
}

/// `GET /api/v1/conversation_tags/all`
pub async fn list_all_tags(State(state): State<Arc<AppState>>) -> ApiResult<Json<TagList>> {
    Ok(Json(state.tags.list_all().await?))
}

/// `POST /api/v1/conversation_tags`
pub async fn add_tag(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewTag>, JsonRejection>,
) -> ApiResult<Json<Tag>> {
    let Json(request) = body?;
    Ok(Json(
        state
            .tags
            .add(request.conversation_id, &request.tag)
            .await?,
    ))
}

/// `PUT /api/v1/conversation_tags/{id}`
pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<TagText>, JsonRejection>,
) -> ApiResult<Json<Tag>> {
    let Json(request) = body?;
    Ok(Json(state.tags.update(&TagId::from(id), &request.tag).await?))
}

/// `DELETE /api/v1/conversation_tags/{id}`
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.tags.delete(&TagId::from(id)).await?;
    Ok(Json(json!({"ok": true})))
}
