use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, CommentService, SeaOrmAuthService, SeaOrmCommentService, SeaOrmTicketService,
    TicketService,
};

/// Services constructed once at startup and handed to every handler.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub ticket_service: Arc<dyn TicketService>,

    pub comment_service: Arc<dyn CommentService>,
}

impl SharedState {
    /// Connects to the database, applies migrations and makes sure an admin
    /// account exists.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let state = Self::with_store(config, store);

        state
            .auth_service
            .ensure_bootstrap_admin(&state.config.bootstrap)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin account: {e}"))?;

        Ok(state)
    }

    /// Wires the services over an already migrated store.
    #[must_use]
    pub fn with_store(config: Config, store: Store) -> Self {
        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let ticket_service = Arc::new(SeaOrmTicketService::new(
            store.clone(),
            config.tickets.clone(),
        )) as Arc<dyn TicketService>;

        let comment_service =
            Arc::new(SeaOrmCommentService::new(store.clone())) as Arc<dyn CommentService>;

        Self {
            config: Arc::new(config),
            store,
            auth_service,
            ticket_service,
            comment_service,
        }
    }
}
