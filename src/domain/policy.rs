//! Authorization policy.
//!
//! Every allow/deny decision in the crate goes through [`can_perform`]. Handlers
//! and services never branch on roles themselves; they describe the action and
//! the target and ask the policy.
//!
//! Unauthenticated callers never reach this module: the request layer rejects
//! them before a [`Principal`] exists.

use super::{Principal, TicketStatus, UserId, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTicket,
    ListTickets,
    ViewTicket,
    AssignTicket,
    ChangeStatus,
    DeleteTicket,
    CommentOnTicket,
    /// List or create arbitrary user accounts.
    ManageUsers,
    /// Edit profile fields (name, company, password, ...) of a user.
    UpdateUser,
    ChangeRole,
    ListSupportStaff,
    ViewMetrics,
}

/// Ownership facts about a ticket, read from storage at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketAccess {
    pub owner_id: UserId,
    pub assignee_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    None,
    Ticket(TicketAccess),
    User(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    const fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// Which tickets a principal's listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    OwnedBy(UserId),
    AssignedTo(UserId),
    All,
}

/// Decides whether `principal` may perform `action` on `target`.
///
/// A target of the wrong shape for the action (e.g. `ViewTicket` on
/// `Target::None`) is denied.
#[must_use]
pub fn can_perform(principal: &Principal, action: Action, target: &Target) -> Decision {
    let me = principal.id;
    let allowed = match (action, principal.role, target) {
        (
            Action::ViewMetrics | Action::ManageUsers | Action::DeleteTicket | Action::ChangeRole,
            role,
            _,
        ) => role == UserRole::Admin,

        (Action::ListTickets | Action::ListSupportStaff, _, _) => true,

        // Admins file tickets on behalf of customers; the service checks the
        // beneficiary's role.
        (Action::CreateTicket, UserRole::Customer, Target::User(owner)) => *owner == me,
        (Action::CreateTicket, UserRole::Admin, Target::User(_)) => true,
        (Action::CreateTicket, _, _) => false,

        (Action::ViewTicket | Action::CommentOnTicket, UserRole::Admin, Target::Ticket(_)) => true,
        (Action::ViewTicket | Action::CommentOnTicket, UserRole::Customer, Target::Ticket(t)) => {
            t.owner_id == me
        }
        (Action::ViewTicket | Action::CommentOnTicket, UserRole::Support, Target::Ticket(t)) => {
            t.assignee_id == Some(me)
        }

        (Action::AssignTicket, UserRole::Support | UserRole::Admin, Target::Ticket(_)) => true,

        (Action::ChangeStatus, UserRole::Admin, Target::Ticket(_)) => true,
        (Action::ChangeStatus, UserRole::Support, Target::Ticket(t)) => {
            t.assignee_id.is_none() || t.assignee_id == Some(me)
        }

        (Action::UpdateUser, UserRole::Admin, Target::User(_)) => true,
        (Action::UpdateUser, _, Target::User(id)) => *id == me,

        _ => false,
    };

    Decision::from_bool(allowed)
}

/// Scope of `GET /tickets` for the given principal.
#[must_use]
pub const fn ticket_scope(principal: &Principal) -> TicketScope {
    match principal.role {
        UserRole::Customer => TicketScope::OwnedBy(principal.id),
        UserRole::Support => TicketScope::AssignedTo(principal.id),
        UserRole::Admin => TicketScope::All,
    }
}

/// Whether `principal` may move a ticket from `from` to `to`.
///
/// Forward moves are always allowed once [`Action::ChangeStatus`] passes.
/// Backward moves (reopening) are admin-only and only when `allow_reopen`.
#[must_use]
pub const fn transition_allowed(
    principal: &Principal,
    from: TicketStatus,
    to: TicketStatus,
    allow_reopen: bool,
) -> bool {
    if from.is_forward(to) {
        return true;
    }
    from.rank() != to.rank() && allow_reopen && principal.is_admin()
}
