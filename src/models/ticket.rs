use serde::{Deserialize, Serialize};

use crate::domain::policy::TicketAccess;
use crate::domain::{TicketId, TicketStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: String,
    /// Creator and owner; never changes after creation.
    pub user_id: UserId,
    pub assigned_to_id: Option<UserId>,
    pub created_at: String,
    pub updated_at: String,
}

impl Ticket {
    #[must_use]
    pub const fn access(&self) -> TicketAccess {
        TicketAccess {
            owner_id: self.user_id,
            assignee_id: self.assigned_to_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    /// Customer the ticket is filed for. Only admins may set it; customers
    /// always file for themselves.
    #[serde(default)]
    pub on_behalf_of: Option<UserId>,
}
