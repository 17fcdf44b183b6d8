//! Domain service for the ticket lifecycle.

use thiserror::Error;

use crate::domain::{Principal, TicketId, TicketStatus, UserId};
use crate::models::{NewTicket, Ticket};
use crate::services::validation::ValidationError;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Assignee must be a support or admin user")]
    InvalidAssignee,

    #[error("Cannot move ticket from {from} to {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for TicketError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for TicketError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ValidationError> for TicketError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}

/// Every method re-reads the ticket and re-checks the policy inside the
/// same transaction as its write.
#[async_trait::async_trait]
pub trait TicketService: Send + Sync {
    /// Files a ticket. Customers file for themselves; admins may file for a
    /// customer through `input.on_behalf_of`.
    async fn create_ticket(&self, actor: &Principal, input: NewTicket)
    -> Result<Ticket, TicketError>;

    /// # Errors
    ///
    /// [`TicketError::NotFound`] both when the ticket is absent and when
    /// `actor` may not see it.
    async fn get_ticket(&self, actor: &Principal, id: TicketId) -> Result<Ticket, TicketError>;

    /// Tickets visible to `actor`, newest first.
    async fn list_tickets(&self, actor: &Principal) -> Result<Vec<Ticket>, TicketError>;

    /// Sets or clears (`None`) the assignee.
    ///
    /// # Errors
    ///
    /// [`TicketError::InvalidAssignee`] if `assignee` is missing or not staff;
    /// the ticket is left unchanged.
    async fn assign_ticket(
        &self,
        actor: &Principal,
        id: TicketId,
        assignee: Option<UserId>,
    ) -> Result<Ticket, TicketError>;

    async fn update_status(
        &self,
        actor: &Principal,
        id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, TicketError>;

    /// Hard delete, comments included.
    ///
    /// # Errors
    ///
    /// [`TicketError::Forbidden`] for any non-admin, whether or not the
    /// ticket exists.
    async fn delete_ticket(&self, actor: &Principal, id: TicketId) -> Result<(), TicketError>;
}
