use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Role-scoped listings filter on owner or assignee, newest first.
        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_user_id_created_at")
                    .table(Tickets::Table)
                    .col(Tickets::UserId)
                    .col(Tickets::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_assigned_to_id_created_at")
                    .table(Tickets::Table)
                    .col(Tickets::AssignedToId)
                    .col(Tickets::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_comments_ticket_id")
                    .table(TicketComments::Table)
                    .col(TicketComments::TicketId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_ticket_comments_ticket_id",
            "idx_tickets_assigned_to_id_created_at",
            "idx_tickets_user_id_created_at",
        ] {
            manager
                .drop_index(Index::drop().name(name).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    UserId,
    AssignedToId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TicketComments {
    Table,
    TicketId,
}
