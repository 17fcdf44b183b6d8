//! `SeaORM` implementation of the `TicketService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::config::TicketConfig;
use crate::db::{CommentRepository, Store, TicketRepository, UserRepository};
use crate::domain::policy::{Action, Target, can_perform, ticket_scope, transition_allowed};
use crate::domain::{Principal, TicketId, TicketStatus, UserId, UserRole};
use crate::models::{NewTicket, Ticket};
use crate::services::ticket_service::{TicketError, TicketService};
use crate::services::validation::{
    MAX_DESCRIPTION_LEN, MAX_TITLE_LEN, normalize_priority, validate_text,
};

pub struct SeaOrmTicketService {
    store: Store,
    config: TicketConfig,
}

impl SeaOrmTicketService {
    #[must_use]
    pub const fn new(store: Store, config: TicketConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl TicketService for SeaOrmTicketService {
    async fn create_ticket(
        &self,
        actor: &Principal,
        input: NewTicket,
    ) -> Result<Ticket, TicketError> {
        let owner = input.on_behalf_of.unwrap_or(actor.id);
        if !can_perform(actor, Action::CreateTicket, &Target::User(owner)).is_allowed() {
            return Err(TicketError::Forbidden);
        }

        let title = validate_text("Title", &input.title, MAX_TITLE_LEN)?;
        let description = validate_text("Description", &input.description, MAX_DESCRIPTION_LEN)?;
        let priority =
            normalize_priority(input.priority.as_deref(), &self.config.default_priority)?;

        let txn = self.store.begin().await?;

        if owner != actor.id {
            let beneficiary = UserRepository::new(&txn).get_by_id(owner).await?;
            if !beneficiary.is_some_and(|u| u.role == UserRole::Customer) {
                return Err(TicketError::Validation(
                    "Tickets can only be filed for a customer account".to_string(),
                ));
            }
        }

        let ticket = TicketRepository::new(&txn)
            .insert(owner, &title, &description, &priority)
            .await?;
        txn.commit().await?;

        Ok(ticket)
    }

    async fn get_ticket(&self, actor: &Principal, id: TicketId) -> Result<Ticket, TicketError> {
        let ticket = self
            .store
            .tickets()
            .get(id)
            .await?
            .ok_or(TicketError::NotFound)?;

        if !can_perform(actor, Action::ViewTicket, &Target::Ticket(ticket.access())).is_allowed() {
            return Err(TicketError::NotFound);
        }
        Ok(ticket)
    }

    async fn list_tickets(&self, actor: &Principal) -> Result<Vec<Ticket>, TicketError> {
        if !can_perform(actor, Action::ListTickets, &Target::None).is_allowed() {
            return Err(TicketError::Forbidden);
        }
        Ok(self.store.tickets().list(ticket_scope(actor)).await?)
    }

    async fn assign_ticket(
        &self,
        actor: &Principal,
        id: TicketId,
        assignee: Option<UserId>,
    ) -> Result<Ticket, TicketError> {
        let txn = self.store.begin().await?;
        let tickets = TicketRepository::new(&txn);

        let ticket = tickets.get(id).await?.ok_or(TicketError::NotFound)?;
        if !can_perform(actor, Action::AssignTicket, &Target::Ticket(ticket.access())).is_allowed()
        {
            return Err(TicketError::Forbidden);
        }

        if let Some(assignee) = assignee {
            let user = UserRepository::new(&txn).get_by_id(assignee).await?;
            if !user.is_some_and(|u| u.role.is_staff()) {
                return Err(TicketError::InvalidAssignee);
            }
        }

        let ticket = tickets
            .set_assignee(id, assignee)
            .await?
            .ok_or(TicketError::NotFound)?;
        txn.commit().await?;

        info!(
            ticket_id = %id,
            actor_id = %actor.id,
            assignee_id = ?assignee.map(|a| a.value()),
            "Ticket assignment changed"
        );
        Ok(ticket)
    }

    async fn update_status(
        &self,
        actor: &Principal,
        id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, TicketError> {
        let txn = self.store.begin().await?;
        let tickets = TicketRepository::new(&txn);

        let ticket = tickets.get(id).await?.ok_or(TicketError::NotFound)?;
        if !can_perform(actor, Action::ChangeStatus, &Target::Ticket(ticket.access())).is_allowed()
        {
            return Err(TicketError::Forbidden);
        }

        let from = ticket.status;
        if !transition_allowed(actor, from, status, self.config.allow_reopen) {
            return Err(TicketError::InvalidTransition { from, to: status });
        }

        let ticket = tickets
            .set_status(id, status)
            .await?
            .ok_or(TicketError::NotFound)?;
        txn.commit().await?;

        info!(ticket_id = %id, actor_id = %actor.id, %from, to = %status, "Ticket status changed");
        Ok(ticket)
    }

    async fn delete_ticket(&self, actor: &Principal, id: TicketId) -> Result<(), TicketError> {
        // Deletion does not depend on the ticket, so refuse before looking.
        if !can_perform(actor, Action::DeleteTicket, &Target::None).is_allowed() {
            return Err(TicketError::Forbidden);
        }

        let txn = self.store.begin().await?;
        let tickets = TicketRepository::new(&txn);

        let ticket = tickets.get(id).await?.ok_or(TicketError::NotFound)?;
        if !can_perform(actor, Action::DeleteTicket, &Target::Ticket(ticket.access())).is_allowed()
        {
            return Err(TicketError::Forbidden);
        }

        let comments = CommentRepository::new(&txn).delete_for_ticket(id).await?;
        if !tickets.delete(id).await? {
            return Err(TicketError::NotFound);
        }
        txn.commit().await?;

        info!(ticket_id = %id, actor_id = %actor.id, comments, "Ticket deleted");
        Ok(())
    }
}
