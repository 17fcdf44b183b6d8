use serde::Serialize;

use crate::domain::{TicketId, UserId};

/// A comment on a ticket. Comments are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub id: i32,
    pub content: String,
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub created_at: String,
}
