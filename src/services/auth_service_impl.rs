//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use sea_orm::{DbErr, SqlErr};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{BootstrapConfig, DEFAULT_ADMIN_PASSWORD, SecurityConfig};
use crate::db::repositories::user::{
    NewUserRecord, generate_token, hash_password, verify_password_hash,
};
use crate::db::{Store, UserChanges, UserRepository, timestamp_after, timestamp_now};
use crate::domain::policy::{Action, Target, can_perform};
use crate::domain::{Principal, UserId, UserRole};
use crate::models::{NewUser, ResetToken, User, UserPatch};
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::validation::{
    normalize_email, normalize_optional, validate_name, validate_password,
};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    /// Compared against when the email is unknown, so a miss costs the same
    /// as a wrong password.
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig) -> Self {
        Self {
            store,
            security,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let security = self.security.clone();
        tokio::task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify(password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_password_hash(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn dummy_hash(&self) -> Result<&str, AuthError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| async { self.hash(&generate_token()).await })
            .await?;
        Ok(hash.as_str())
    }

    /// Validates and inserts. Role checks are the caller's job.
    async fn insert_user(&self, input: NewUser) -> Result<User, AuthError> {
        let email = normalize_email(&input.email)?;
        validate_password(&input.password, self.security.min_password_length)?;
        let first_name = validate_name("First name", &input.first_name)?;
        let last_name = validate_name("Last name", &input.last_name)?;

        if self.store.users().email_exists(&email).await? {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hash(&input.password).await?;
        let record = NewUserRecord {
            email,
            password_hash,
            first_name,
            last_name,
            role: input.role.unwrap_or(UserRole::Customer),
            company: normalize_optional(input.company),
            department: normalize_optional(input.department),
            designation: normalize_optional(input.designation),
            phone: normalize_optional(input.phone),
        };

        // The unique index settles races the pre-check above cannot.
        let user = UserRepository::new(self.store.writer())
            .insert(record)
            .await
            .map_err(map_unique_violation)?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }
}

/// A unique-constraint failure on insert means the email was taken between
/// the existence check and the write.
fn map_unique_violation(err: anyhow::Error) -> AuthError {
    let is_unique = err
        .downcast_ref::<DbErr>()
        .and_then(DbErr::sql_err)
        .is_some_and(|e| matches!(e, SqlErr::UniqueConstraintViolation(_)));

    if is_unique {
        AuthError::DuplicateEmail
    } else {
        AuthError::from(err)
    }
}

fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| normalize_optional(Some(v)))
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, input: NewUser, actor: Option<&Principal>) -> Result<User, AuthError> {
        let elevated = input.role.is_some_and(|r| r != UserRole::Customer);
        if elevated {
            let allowed = actor
                .is_some_and(|p| can_perform(p, Action::ManageUsers, &Target::None).is_allowed());
            if !allowed {
                return Err(AuthError::Forbidden);
            }
        }

        self.insert_user(input).await
    }

    async fn create_user(&self, actor: &Principal, input: NewUser) -> Result<User, AuthError> {
        if !can_perform(actor, Action::ManageUsers, &Target::None).is_allowed() {
            return Err(AuthError::Forbidden);
        }
        self.insert_user(input).await
    }

    async fn provision(&self, input: NewUser) -> Result<User, AuthError> {
        self.insert_user(input).await
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Ok(email) = normalize_email(email) else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some((user, password_hash)) =
            self.store.users().get_by_email_with_password(&email).await?
        else {
            let dummy = self.dummy_hash().await?;
            let _ = Self::verify(password, dummy).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if Self::verify(password, &password_hash).await? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.store
            .users()
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let email = normalize_email(email)?;
        Ok(self.store.users().email_exists(&email).await?)
    }

    async fn set_reset_token(&self, user_id: UserId) -> Result<ResetToken, AuthError> {
        let token = generate_token();
        let expires_at =
            timestamp_after(chrono::Duration::minutes(self.security.reset_token_ttl_minutes));

        if !UserRepository::new(self.store.writer())
            .set_reset_token(user_id, &token, &expires_at)
            .await?
        {
            return Err(AuthError::UserNotFound);
        }

        // No mail delivery: the token only goes to the debug log.
        debug!(user_id = %user_id, token = %token, expires_at = %expires_at, "Issued password reset token");
        Ok(ResetToken { token, expires_at })
    }

    async fn request_password_reset(&self, email: &str) -> Result<ResetToken, AuthError> {
        let email = normalize_email(email)?;
        let user = self
            .store
            .users()
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.set_reset_token(user.id).await
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        new_password: &str,
        email: Option<&str>,
    ) -> Result<(), AuthError> {
        validate_password(new_password, self.security.min_password_length)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::ExpiredOrInvalidToken);
        }
        let email = email.map(normalize_email).transpose()?;

        // Hash outside the transaction; a bad token is rejected again below.
        if self.store.users().get_by_reset_token(token).await?.is_none() {
            return Err(AuthError::ExpiredOrInvalidToken);
        }
        let password_hash = self.hash(new_password).await?;

        let txn = self.store.begin().await?;
        let users = UserRepository::new(&txn);

        let Some((user, expires_at)) = users.get_by_reset_token(token).await? else {
            return Err(AuthError::ExpiredOrInvalidToken);
        };
        let expired = expires_at.is_none_or(|at| at.as_str() <= timestamp_now().as_str());
        let wrong_account = email.is_some_and(|e| e != user.email);
        if expired || wrong_account {
            return Err(AuthError::ExpiredOrInvalidToken);
        }

        // Setting the hash also clears the reset and remember tokens.
        users
            .update(
                user.id,
                UserChanges {
                    password_hash: Some(password_hash),
                    ..UserChanges::default()
                },
            )
            .await?
            .ok_or(AuthError::ExpiredOrInvalidToken)?;
        txn.commit().await?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    async fn set_remember_token(&self, user_id: UserId) -> Result<String, AuthError> {
        let token = generate_token();
        let expires_at =
            timestamp_after(chrono::Duration::days(self.security.remember_token_days));

        if !UserRepository::new(self.store.writer())
            .set_remember_token(user_id, &token, &expires_at)
            .await?
        {
            return Err(AuthError::UserNotFound);
        }
        Ok(token)
    }

    async fn verify_remember_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .users()
            .get_by_remember_token(token, &timestamp_now())
            .await?)
    }

    async fn clear_remember_token(&self, user_id: UserId) -> Result<(), AuthError> {
        UserRepository::new(self.store.writer())
            .clear_remember_token(user_id)
            .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        actor: &Principal,
        id: UserId,
        patch: UserPatch,
    ) -> Result<User, AuthError> {
        if patch.is_empty() {
            return Err(AuthError::Validation("No fields to update".to_string()));
        }

        let first_name = patch
            .first_name
            .as_deref()
            .map(|v| validate_name("First name", v))
            .transpose()?;
        let last_name = patch
            .last_name
            .as_deref()
            .map(|v| validate_name("Last name", v))
            .transpose()?;
        if let Some(password) = patch.password.as_deref() {
            validate_password(password, self.security.min_password_length)?;
        }

        // Cheap authorization pass before paying for a hash; repeated below
        // against the row read inside the transaction.
        let target = Target::User(id);
        if !can_perform(actor, Action::UpdateUser, &target).is_allowed() {
            return Err(AuthError::Forbidden);
        }
        let password_hash = match patch.password.as_deref() {
            Some(password) => Some(self.hash(password).await?),
            None => None,
        };

        let txn = self.store.begin().await?;
        let users = UserRepository::new(&txn);

        let current = users.get_by_id(id).await?.ok_or(AuthError::UserNotFound)?;
        if !can_perform(actor, Action::UpdateUser, &target).is_allowed() {
            return Err(AuthError::Forbidden);
        }

        let role = match patch.role {
            Some(role) if role != current.role => {
                if !can_perform(actor, Action::ChangeRole, &target).is_allowed() {
                    return Err(AuthError::Forbidden);
                }
                if current.role == UserRole::Admin && users.count_by_role(UserRole::Admin).await? <= 1
                {
                    return Err(AuthError::Validation(
                        "Cannot change the role of the last admin".to_string(),
                    ));
                }
                Some(role)
            }
            _ => None,
        };

        let changes = UserChanges {
            first_name,
            last_name,
            password_hash,
            role,
            company: clearable(patch.company),
            department: clearable(patch.department),
            designation: clearable(patch.designation),
            phone: clearable(patch.phone),
        };

        let user = users
            .update(id, changes)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        txn.commit().await?;

        info!(user_id = %id, actor_id = %actor.id, "User updated");
        Ok(user)
    }

    async fn list_users(&self, actor: &Principal) -> Result<Vec<User>, AuthError> {
        if !can_perform(actor, Action::ManageUsers, &Target::None).is_allowed() {
            return Err(AuthError::Forbidden);
        }
        Ok(self.store.users().list_all().await?)
    }

    async fn list_support_staff(&self, actor: &Principal) -> Result<Vec<User>, AuthError> {
        if !can_perform(actor, Action::ListSupportStaff, &Target::None).is_allowed() {
            return Err(AuthError::Forbidden);
        }
        Ok(self.store.users().list_by_role(UserRole::Support).await?)
    }

    async fn ensure_bootstrap_admin(
        &self,
        config: &BootstrapConfig,
    ) -> Result<Option<User>, AuthError> {
        if !config.enabled {
            return Ok(None);
        }
        if self.store.users().count_by_role(UserRole::Admin).await? > 0 {
            return Ok(None);
        }

        let email = normalize_email(&config.admin_email)?;
        if self.store.users().email_exists(&email).await? {
            warn!(
                email = %email,
                "No admin account exists and the bootstrap email belongs to another user; skipping"
            );
            return Ok(None);
        }

        let user = self
            .provision(NewUser {
                email,
                password: config.admin_password.clone(),
                first_name: config.admin_first_name.clone(),
                last_name: config.admin_last_name.clone(),
                role: Some(UserRole::Admin),
                ..NewUser::default()
            })
            .await?;

        if config.admin_password == DEFAULT_ADMIN_PASSWORD {
            warn!(
                email = %user.email,
                "Bootstrap admin created with the default password. Change it immediately."
            );
        } else {
            info!(email = %user.email, "Bootstrap admin created");
        }

        Ok(Some(user))
    }
}
