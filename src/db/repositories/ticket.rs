use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::db::timestamp_now;
use crate::domain::policy::TicketScope;
use crate::domain::{TicketId, TicketStatus, UserId};
use crate::entities::tickets;
use crate::models::Ticket;

impl TryFrom<tickets::Model> for Ticket {
    type Error = anyhow::Error;

    fn try_from(model: tickets::Model) -> Result<Self> {
        let status = model
            .status
            .parse::<TicketStatus>()
            .with_context(|| format!("Ticket {} has an invalid stored status", model.id))?;

        Ok(Self {
            id: TicketId::new(model.id),
            title: model.title,
            description: model.description,
            status,
            priority: model.priority,
            user_id: UserId::new(model.user_id),
            assigned_to_id: model.assigned_to_id.map(UserId::new),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Repository for ticket rows
pub struct TicketRepository<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> TicketRepository<'c, C> {
    #[must_use]
    pub const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    async fn find_model(&self, id: TicketId) -> Result<Option<tickets::Model>> {
        tickets::Entity::find_by_id(id.value())
            .one(self.conn)
            .await
            .context("Failed to query ticket")
    }

    pub async fn insert(
        &self,
        owner: UserId,
        title: &str,
        description: &str,
        priority: &str,
    ) -> Result<Ticket> {
        let now = timestamp_now();
        let active = tickets::ActiveModel {
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            status: Set(TicketStatus::Open.as_str().to_string()),
            priority: Set(priority.to_string()),
            user_id: Set(owner.value()),
            assigned_to_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(self.conn).await?;
        info!("Created ticket {} for user {}", model.id, owner);
        Ticket::try_from(model)
    }

    pub async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        self.find_model(id).await?.map(Ticket::try_from).transpose()
    }

    /// Tickets in `scope`, newest first.
    pub async fn list(&self, scope: TicketScope) -> Result<Vec<Ticket>> {
        let query = match scope {
            TicketScope::OwnedBy(user) => {
                tickets::Entity::find().filter(tickets::Column::UserId.eq(user.value()))
            }
            TicketScope::AssignedTo(user) => {
                tickets::Entity::find().filter(tickets::Column::AssignedToId.eq(user.value()))
            }
            TicketScope::All => tickets::Entity::find(),
        };

        let rows = query
            .order_by_desc(tickets::Column::CreatedAt)
            .order_by_desc(tickets::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list tickets")?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    /// Set or clear the assignee. Returns `None` if the ticket does not exist.
    pub async fn set_assignee(
        &self,
        id: TicketId,
        assignee: Option<UserId>,
    ) -> Result<Option<Ticket>> {
        let Some(model) = self.find_model(id).await? else {
            return Ok(None);
        };

        let mut active: tickets::ActiveModel = model.into();
        active.assigned_to_id = Set(assignee.map(|u| u.value()));
        active.updated_at = Set(timestamp_now());
        let model = active.update(self.conn).await?;

        Ok(Some(Ticket::try_from(model)?))
    }

    /// Returns `None` if the ticket does not exist.
    pub async fn set_status(&self, id: TicketId, status: TicketStatus) -> Result<Option<Ticket>> {
        let Some(model) = self.find_model(id).await? else {
            return Ok(None);
        };

        let mut active: tickets::ActiveModel = model.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(timestamp_now());
        let model = active.update(self.conn).await?;

        Ok(Some(Ticket::try_from(model)?))
    }

    pub async fn delete(&self, id: TicketId) -> Result<bool> {
        let result = tickets::Entity::delete_by_id(id.value())
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
