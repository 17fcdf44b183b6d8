use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::timestamp_now;
use crate::domain::{TicketId, UserId};
use crate::entities::ticket_comments;
use crate::models::TicketComment;

impl From<ticket_comments::Model> for TicketComment {
    fn from(model: ticket_comments::Model) -> Self {
        Self {
            id: model.id,
            content: model.content,
            ticket_id: TicketId::new(model.ticket_id),
            user_id: UserId::new(model.user_id),
            created_at: model.created_at,
        }
    }
}

/// Repository for ticket comments. There is no update path: comments are
/// append-only and only disappear together with their ticket.
pub struct CommentRepository<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> CommentRepository<'c, C> {
    #[must_use]
    pub const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    pub async fn insert(
        &self,
        ticket_id: TicketId,
        author: UserId,
        content: &str,
    ) -> Result<TicketComment> {
        let active = ticket_comments::ActiveModel {
            content: Set(content.to_string()),
            ticket_id: Set(ticket_id.value()),
            user_id: Set(author.value()),
            created_at: Set(timestamp_now()),
            ..Default::default()
        };

        let model = active.insert(self.conn).await?;
        Ok(TicketComment::from(model))
    }

    /// Comments on a ticket, newest first.
    pub async fn list_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<TicketComment>> {
        let rows = ticket_comments::Entity::find()
            .filter(ticket_comments::Column::TicketId.eq(ticket_id.value()))
            .order_by_desc(ticket_comments::Column::CreatedAt)
            .order_by_desc(ticket_comments::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list ticket comments")?;

        Ok(rows.into_iter().map(TicketComment::from).collect())
    }

    pub async fn delete_for_ticket(&self, ticket_id: TicketId) -> Result<u64> {
        let result = ticket_comments::Entity::delete_many()
            .filter(ticket_comments::Column::TicketId.eq(ticket_id.value()))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
