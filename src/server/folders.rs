//! Folder endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::common::ids::{ConversationId, FolderId};
use crate::folders::Folder;

use super::error::ApiResult;
use super::routes::Data;
use super::state::AppState;

/// Body of folder create and rename.
#[derive(Debug, Deserialize)]
pub struct FolderName {
    /// New name.
    #[serde(default)]
    pub name: String,
}

/// Body of folder membership changes.
#[derive(Debug, Deserialize)]
pub struct FolderMember {
    /// Conversation to add or remove.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl FolderMember {
    /// `None` for a missing or blank id; invalid ids are rejected.
    fn conversation_id(self) -> ApiResult<Option<ConversationId>> {
        match self.conversation_id.filter(|id| !id.trim().is_empty()) {
            Some(raw) => Ok(Some(ConversationId::new(raw)?)),
            None => Ok(None),
        }
    }
}

/// `GET /api/v1/folders`
pub async fn list_folders(State(state): State<Arc<AppState>>) -> ApiResult<Json<Data<Vec<Folder>>>> {
    Ok(Json(Data::new(state.folders.list().await?)))
}

/// `POST /api/v1/folders`
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FolderName>, JsonRejection>,
) -> ApiResult<Json<Data<Folder>>> {
    let Json(request) = body?;
    Ok(Json(Data::new(state.folders.create(&request.name).await?)))
}

/// `PATCH /api/v1/folders/{id}`
pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<FolderName>, JsonRejection>,
) -> ApiResult<Json<Data<Folder>>> {
    let Json(request) = body?;
    let folder = state
        .folders
        .rename(&FolderId::from(id), &request.name)
        .await?;
    Ok(Json(Data::new(folder)))
}

/// `DELETE /api/v1/folders/{id}`
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Data<Value>>> {
    state.folders.delete(&FolderId::from(id)).await?;
    Ok(Json(Data::new(json!({"success": true}))))
}

/// `POST /api/v1/folders/{id}/add`
pub async fn add_to_folder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<FolderMember>, JsonRejection>,
) -> ApiResult<Json<Data<Folder>>> {
    let Json(request) = body?;
    let folder = state
        .folders
        .add_conversation(&FolderId::from(id), request.conversation_id()?)
        .await?;
    Ok(Json(Data::new(folder)))
}

/// `POST /api/v1/folders/{id}/remove`
pub async fn remove_from_folder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<FolderMember>, JsonRejection>,
) -> ApiResult<Json<Data<Folder>>> {
    let Json(request) = body?;
    let folder = state
        .folders
        .remove_conversation(&FolderId::from(id), request.conversation_id()?)
        .await?;
    Ok(Json(Data::new(folder)))
}
