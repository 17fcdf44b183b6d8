//! Ticket endpoints. Authorization lives in the ticket service; handlers only
//! translate between HTTP and service calls.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Authenticated;
use super::{ApiError, ApiResponse, AppState};
use crate::domain::{TicketId, TicketStatus, UserId};
use crate::models::{NewTicket, Ticket};
use crate::services::TicketError;

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound => Self::NotFound("Ticket not found".to_string()),
            TicketError::Forbidden => Self::forbidden(),
            err @ (TicketError::InvalidAssignee | TicketError::InvalidTransition { .. }) => {
                Self::validation(err.to_string())
            }
            TicketError::Validation(msg) => Self::validation(msg),
            TicketError::Database(msg) => Self::DatabaseError(msg),
            TicketError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// `null` unassigns.
    pub assigned_to_id: Option<UserId>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

/// POST /tickets
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Json(payload): Json<NewTicket>,
) -> Result<Json<ApiResponse<Ticket>>, ApiError> {
    let ticket = state.tickets().create_ticket(&principal, payload).await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// GET /tickets
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
) -> Result<Json<ApiResponse<Vec<Ticket>>>, ApiError> {
    let tickets = state.tickets().list_tickets(&principal).await?;
    Ok(Json(ApiResponse::success(tickets)))
}

/// GET /tickets/{id}
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Ticket>>, ApiError> {
    let ticket = state
        .tickets()
        .get_ticket(&principal, TicketId::new(id))
        .await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// DELETE /tickets/{id}
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state
        .tickets()
        .delete_ticket(&principal, TicketId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /tickets/{id}/assign
pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<ApiResponse<Ticket>>, ApiError> {
    let ticket = state
        .tickets()
        .assign_ticket(&principal, TicketId::new(id), payload.assigned_to_id)
        .await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// PATCH /tickets/{id}/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Ticket>>, ApiError> {
    let ticket = state
        .tickets()
        .update_status(&principal, TicketId::new(id), payload.status)
        .await?;
    Ok(Json(ApiResponse::success(ticket)))
}
