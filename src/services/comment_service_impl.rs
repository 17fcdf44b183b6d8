//! `SeaORM` implementation of the `CommentService` trait.

use async_trait::async_trait;

use crate::db::{CommentRepository, Store, TicketRepository};
use crate::domain::policy::{Action, Target, can_perform};
use crate::domain::{Principal, TicketId};
use crate::models::TicketComment;
use crate::services::comment_service::{CommentError, CommentService};
use crate::services::validation::validate_comment;

pub struct SeaOrmCommentService {
    store: Store,
}

impl SeaOrmCommentService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommentService for SeaOrmCommentService {
    async fn add_comment(
        &self,
        actor: &Principal,
        ticket_id: TicketId,
        content: &str,
    ) -> Result<TicketComment, CommentError> {
        let content = validate_comment(content)?;

        // Same transaction as the insert so a concurrent delete cannot leave
        // an orphan behind.
        let txn = self.store.begin().await?;
        let ticket = TicketRepository::new(&txn)
            .get(ticket_id)
            .await?
            .ok_or(CommentError::TicketNotFound)?;

        if !can_perform(actor, Action::CommentOnTicket, &Target::Ticket(ticket.access()))
            .is_allowed()
        {
            return Err(CommentError::Forbidden);
        }

        let comment = CommentRepository::new(&txn)
            .insert(ticket_id, actor.id, &content)
            .await?;
        txn.commit().await?;

        Ok(comment)
    }

    async fn list_comments(
        &self,
        actor: &Principal,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketComment>, CommentError> {
        let ticket = self
            .store
            .tickets()
            .get(ticket_id)
            .await?
            .ok_or(CommentError::TicketNotFound)?;

        if !can_perform(actor, Action::ViewTicket, &Target::Ticket(ticket.access())).is_allowed() {
            return Err(CommentError::TicketNotFound);
        }

        Ok(self.store.comments().list_for_ticket(ticket_id).await?)
    }
}
