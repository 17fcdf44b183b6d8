use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Authenticated;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::TicketId;
use crate::models::TicketComment;
use crate::services::CommentError;

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::TicketNotFound => Self::NotFound("Ticket not found".to_string()),
            CommentError::Forbidden => Self::forbidden(),
            CommentError::Validation(msg) => Self::validation(msg),
            CommentError::Database(msg) => Self::DatabaseError(msg),
            CommentError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// POST /tickets/{id}/comments
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<ApiResponse<TicketComment>>, ApiError> {
    let comment = state
        .comments()
        .add_comment(&principal, TicketId::new(id), &payload.content)
        .await?;
    Ok(Json(ApiResponse::success(comment)))
}

/// GET /tickets/{id}/comments
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<TicketComment>>>, ApiError> {
    let comments = state
        .comments()
        .list_comments(&principal, TicketId::new(id))
        .await?;
    Ok(Json(ApiResponse::success(comments)))
}
