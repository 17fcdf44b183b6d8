//! Domain service for ticket comments.

use thiserror::Error;

use crate::domain::{Principal, TicketId};
use crate::models::TicketComment;
use crate::services::validation::ValidationError;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("Ticket not found")]
    TicketNotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CommentError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CommentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ValidationError> for CommentError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}

#[async_trait::async_trait]
pub trait CommentService: Send + Sync {
    /// Appends a comment authored by `actor`. The author must be able to see
    /// the ticket.
    async fn add_comment(
        &self,
        actor: &Principal,
        ticket_id: TicketId,
        content: &str,
    ) -> Result<TicketComment, CommentError>;

    /// Comments on a ticket, newest first. Hidden tickets read as missing.
    async fn list_comments(
        &self,
        actor: &Principal,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketComment>, CommentError>;
}
