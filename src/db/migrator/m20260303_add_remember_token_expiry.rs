use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager
            .has_column("users", "remember_token_expires_at")
            .await?
        {
            manager
                .alter_table(
                    Table::alter()
                        .table(Users::Table)
                        .add_column(ColumnDef::new(Users::RememberTokenExpiresAt).text().null())
                        .to_owned(),
                )
                .await?;
        }

        // Tokens issued before expiry was tracked would never lapse.
        manager
            .exec_stmt(
                Query::update()
                    .table(Users::Table)
                    .value(Users::RememberToken, Option::<String>::None)
                    .and_where(Expr::col(Users::RememberTokenExpiresAt).is_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Users::Table)
                    .drop_column(Users::RememberTokenExpiresAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    RememberToken,
    RememberTokenExpiresAt,
}
