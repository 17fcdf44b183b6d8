//! Profile and user-management endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::Authenticated;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::UserId;
use crate::models::{NewUser, User, UserPatch};

/// GET /me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.auth().get_user(principal.id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PATCH /me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Json(patch): Json<UserPatch>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .auth()
        .update_user(&principal, principal.id, patch)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.auth().list_users(&principal).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Json(payload): Json<NewUser>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.auth().create_user(&principal, payload).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// GET /users/support
pub async fn list_support_staff(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.auth().list_support_staff(&principal).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .auth()
        .update_user(&principal, UserId::new(id), patch)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}
