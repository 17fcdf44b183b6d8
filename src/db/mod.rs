use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    Statement, TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::comment::CommentRepository;
pub use repositories::ticket::TicketRepository;
pub use repositories::user::{UserChanges, UserRepository};

/// Current time as a fixed-width RFC 3339 UTC string.
///
/// Every timestamp column uses this format so that ordering by the text
/// column is chronological.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `timestamp_now()` shifted by `offset`, in the same format.
#[must_use]
pub fn timestamp_after(offset: chrono::Duration) -> String {
    (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Database handle.
///
/// Reads go through a pool. Every write goes through `writer`, a pool with a
/// single connection, so SQLite never sees two write transactions at once.
/// A deferred transaction that reads before it writes cannot then lose the
/// lock upgrade to another writer.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    writer: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let writer = Database::connect(pool_options(db_url, 1, 1)).await?;
        migrator::Migrator::up(&writer, None).await?;

        // Each in-memory connection is its own database, so share the writer.
        let conn = if in_memory {
            writer.clone()
        } else {
            Database::connect(pool_options(db_url, max_connections, min_connections)).await?
        };

        info!(
            "Database connected & migrations applied (pool: {}-{}, 1 writer)",
            min_connections, max_connections
        );

        Ok(Self { conn, writer })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Starts a write transaction on the writer connection. Repositories
    /// built on the returned handle see and write a single consistent
    /// snapshot until `commit`.
    ///
    /// Never call while already holding a transaction from this store: the
    /// writer has one connection and the second `begin` waits for it.
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        Ok(self.writer.begin().await?)
    }

    /// Connection for single-statement writes outside a transaction.
    #[must_use]
    pub const fn writer(&self) -> &DatabaseConnection {
        &self.writer
    }

    #[must_use]
    pub const fn users(&self) -> UserRepository<'_, DatabaseConnection> {
        UserRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn tickets(&self) -> TicketRepository<'_, DatabaseConnection> {
        TicketRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn comments(&self) -> CommentRepository<'_, DatabaseConnection> {
        CommentRepository::new(&self.conn)
    }
}

fn pool_options(db_url: &str, max_connections: u32, min_connections: u32) -> ConnectOptions {
    let mut opt = ConnectOptions::new(db_url.to_string());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(600))
        .sqlx_logging(false);
    opt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = timestamp_now();
        let b = timestamp_now();
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
        assert!(a <= b);
    }

    #[test]
    fn test_timestamp_after_orders_lexically() {
        let now = timestamp_now();
        let later = timestamp_after(chrono::Duration::minutes(5));
        let earlier = timestamp_after(chrono::Duration::minutes(-5));
        assert!(earlier < now);
        assert!(now < later);
        assert_eq!(now.len(), later.len());
    }
}
