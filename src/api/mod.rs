use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, CommentService, TicketService};
use crate::state::SharedState;

pub mod auth;
mod comments;
mod error;
mod observability;
mod system;
mod tickets;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthService {
        self.shared.auth_service.as_ref()
    }

    #[must_use]
    pub fn tickets(&self) -> &dyn TicketService {
        self.shared.ticket_service.as_ref()
    }

    #[must_use]
    pub fn comments(&self) -> &dyn CommentService {
        self.shared.comment_service.as_ref()
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

/// Session store backed by the application database, with its table
/// migrated. Sessions are written on every login, so they share the
/// single writer connection with the rest of the writes.
pub async fn session_store(state: &AppState) -> anyhow::Result<SqliteStore> {
    let pool = state.store().writer().get_sqlite_connection_pool().clone();
    let session_store = SqliteStore::new(pool);
    session_store.migrate().await?;
    Ok(session_store)
}

/// Purges expired sessions every `period` until the task is aborted.
pub fn spawn_session_cleanup(
    session_store: SqliteStore,
    period: std::time::Duration,
) -> JoinHandle<tower_sessions::session_store::Result<()>> {
    tokio::spawn(session_store.continuously_delete_expired(period))
}

/// Builds the HTTP application with a fresh session store.
pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let sessions = session_store(&state).await?;
    Ok(router_with_sessions(state, sessions))
}

/// Builds the HTTP application on top of an existing session store.
pub fn router_with_sessions(state: Arc<AppState>, session_store: SqliteStore) -> Router {
    let server = state.config().server.clone();

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(server.secure_cookies)
        .with_http_only(true)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_inactivity_minutes,
        )));

    let api_router = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/check-email", post(auth::check_email))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/me", get(users::get_me).patch(users::update_me))
        .route(
            "/tickets",
            post(tickets::create_ticket).get(tickets::list_tickets),
        )
        .route(
            "/tickets/{id}",
            get(tickets::get_ticket).delete(tickets::delete_ticket),
        )
        .route("/tickets/{id}/assign", patch(tickets::assign_ticket))
        .route("/tickets/{id}/status", patch(tickets::update_status))
        .route(
            "/tickets/{id}/comments",
            post(comments::add_comment).get(comments::list_comments),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/support", get(users::list_support_staff))
        .route("/users/{id}", patch(users::update_user))
        .route("/health/live", get(system::health_live))
        .route("/health/ready", get(system::health_ready))
        .route("/metrics", get(observability::get_metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::resolve_principal,
        ))
        .layer(session_layer)
        .with_state(state);

    // Credentials travel in cookies, so wildcard origins are not allowed.
    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter(|s| s.as_str() != "*")
        .filter_map(|s| s.parse().ok())
        .collect();
    let cors_layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer)
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(TraceLayer::new_for_http())
}
