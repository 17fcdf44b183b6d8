//! Domain service for identities and credentials.
//!
//! Covers account creation, credential checks, password reset and
//! remember-me tokens, and profile updates.

use thiserror::Error;

use crate::config::BootstrapConfig;
use crate::domain::{Principal, UserId};
use crate::models::{NewUser, ResetToken, User, UserPatch};
use crate::services::validation::ValidationError;

/// Errors specific to identity operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately vague: covers both unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("Reset token is invalid or has expired")]
    ExpiredOrInvalidToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Self-registration. The account is a customer unless `actor` is an
    /// admin and `input.role` asks for something else.
    ///
    /// # Errors
    ///
    /// [`AuthError::DuplicateEmail`] if the email is taken,
    /// [`AuthError::Forbidden`] for an elevated role without an admin caller.
    async fn register(&self, input: NewUser, actor: Option<&Principal>) -> Result<User, AuthError>;

    /// Admin-only account creation with any role.
    async fn create_user(&self, actor: &Principal, input: NewUser) -> Result<User, AuthError>;

    /// Trusted account creation for operator tooling. Skips the policy.
    async fn provision(&self, input: NewUser) -> Result<User, AuthError>;

    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] whether the email is unknown or the
    /// password is wrong.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn get_user(&self, id: UserId) -> Result<User, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    /// Issues a fresh reset token for `user_id`, replacing any earlier one.
    async fn set_reset_token(&self, user_id: UserId) -> Result<ResetToken, AuthError>;

    /// Looks up `email` and issues a reset token for it.
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`] for an unknown email.
    async fn request_password_reset(&self, email: &str) -> Result<ResetToken, AuthError>;

    /// Replaces the password of the token's holder and burns the token.
    ///
    /// # Errors
    ///
    /// [`AuthError::ExpiredOrInvalidToken`] if the token is unknown, expired,
    /// already used, or `email` names a different account.
    async fn consume_reset_token(
        &self,
        token: &str,
        new_password: &str,
        email: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Issues a new remember-me token, replacing any earlier one.
    async fn set_remember_token(&self, user_id: UserId) -> Result<String, AuthError>;

    /// Returns the holder of `token`, if any.
    async fn verify_remember_token(&self, token: &str) -> Result<Option<User>, AuthError>;

    async fn clear_remember_token(&self, user_id: UserId) -> Result<(), AuthError>;

    /// Applies `patch` to user `id`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Forbidden`] unless `actor` is the user or an admin, or
    /// when a non-admin tries to change a role.
    async fn update_user(
        &self,
        actor: &Principal,
        id: UserId,
        patch: UserPatch,
    ) -> Result<User, AuthError>;

    async fn list_users(&self, actor: &Principal) -> Result<Vec<User>, AuthError>;

    /// Users with the support role, for assignment pickers.
    async fn list_support_staff(&self, actor: &Principal) -> Result<Vec<User>, AuthError>;

    /// Creates the configured admin account when the database has none.
    /// Returns the account if one was created.
    async fn ensure_bootstrap_admin(
        &self,
        config: &BootstrapConfig,
    ) -> Result<Option<User>, AuthError>;
}
