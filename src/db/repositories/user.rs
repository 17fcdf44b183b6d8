use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::config::SecurityConfig;
use crate::db::timestamp_now;
use crate::domain::{UserId, UserRole};
use crate::entities::users;
use crate::models::User;

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        let role = model
            .role
            .parse::<UserRole>()
            .with_context(|| format!("User {} has an invalid stored role", model.id))?;

        Ok(Self {
            id: UserId::new(model.id),
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            role,
            company: model.company,
            department: model.department,
            designation: model.designation,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Row data for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub company: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
}

/// Column changes for an existing account. `None` leaves a column untouched;
/// `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub company: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub designation: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

pub struct UserRepository<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> UserRepository<'c, C> {
    #[must_use]
    pub const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    async fn find_model_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(self.conn)
            .await
            .context("Failed to query user by email")
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id.value())
            .one(self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(User::try_from).transpose()
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_model_by_email(email)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get user by email together with the stored password hash
    pub async fn get_by_email_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let Some(model) = self.find_model_by_email(email).await? else {
            return Ok(None);
        };
        let password_hash = model.password_hash.clone();
        Ok(Some((User::try_from(model)?, password_hash)))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(self.conn)
            .await
            .context("Failed to count users by email")?;
        Ok(count > 0)
    }

    pub async fn insert(&self, record: NewUserRecord) -> Result<User> {
        let now = timestamp_now();
        let active = users::ActiveModel {
            email: Set(record.email),
            password_hash: Set(record.password_hash),
            first_name: Set(record.first_name),
            last_name: Set(record.last_name),
            role: Set(record.role.as_str().to_string()),
            company: Set(record.company),
            department: Set(record.department),
            designation: Set(record.designation),
            phone: Set(record.phone),
            reset_token: Set(None),
            reset_token_expires_at: Set(None),
            remember_token: Set(None),
            remember_token_expires_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(self.conn).await?;
        User::try_from(model)
    }

    /// Apply column changes. Returns `None` if the user does not exist.
    pub async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>> {
        let Some(model) = users::Entity::find_by_id(id.value())
            .one(self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = model.into();
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(hash) = changes.password_hash {
            active.password_hash = Set(hash);
            // A password change revokes outstanding reset and remember tokens.
            active.reset_token = Set(None);
            active.reset_token_expires_at = Set(None);
            active.remember_token = Set(None);
            active.remember_token_expires_at = Set(None);
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(company) = changes.company {
            active.company = Set(company);
        }
        if let Some(department) = changes.department {
            active.department = Set(department);
        }
        if let Some(designation) = changes.designation {
            active.designation = Set(designation);
        }
        if let Some(phone) = changes.phone {
            active.phone = Set(phone);
        }
        active.updated_at = Set(timestamp_now());

        let model = active.update(self.conn).await?;
        Ok(Some(User::try_from(model)?))
    }

    pub async fn set_reset_token(&self, id: UserId, token: &str, expires_at: &str) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(
                users::Column::ResetToken,
                sea_orm::sea_query::Expr::value(token),
            )
            .col_expr(
                users::Column::ResetTokenExpiresAt,
                sea_orm::sea_query::Expr::value(expires_at),
            )
            .filter(users::Column::Id.eq(id.value()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Look up the holder of a reset token, with the token's expiry.
    pub async fn get_by_reset_token(&self, token: &str) -> Result<Option<(User, Option<String>)>> {
        let model = users::Entity::find()
            .filter(users::Column::ResetToken.eq(token))
            .one(self.conn)
            .await
            .context("Failed to query user by reset token")?;

        let Some(model) = model else {
            return Ok(None);
        };
        let expires_at = model.reset_token_expires_at.clone();
        Ok(Some((User::try_from(model)?, expires_at)))
    }

    pub async fn set_remember_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: &str,
    ) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(
                users::Column::RememberToken,
                sea_orm::sea_query::Expr::value(token),
            )
            .col_expr(
                users::Column::RememberTokenExpiresAt,
                sea_orm::sea_query::Expr::value(expires_at),
            )
            .filter(users::Column::Id.eq(id.value()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn clear_remember_token(&self, id: UserId) -> Result<()> {
        users::Entity::update_many()
            .col_expr(
                users::Column::RememberToken,
                sea_orm::sea_query::Expr::value(Option::<String>::None),
            )
            .col_expr(
                users::Column::RememberTokenExpiresAt,
                sea_orm::sea_query::Expr::value(Option::<String>::None),
            )
            .filter(users::Column::Id.eq(id.value()))
            .exec(self.conn)
            .await?;

        Ok(())
    }

    /// Holder of an unexpired remember token. `now` is compared lexically
    /// against the stored expiry.
    pub async fn get_by_remember_token(&self, token: &str, now: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::RememberToken.eq(token))
            .filter(users::Column::RememberTokenExpiresAt.gt(now))
            .one(self.conn)
            .await
            .context("Failed to query user by remember token")?;

        user.map(User::try_from).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list users")?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .order_by_asc(users::Column::LastName)
            .order_by_asc(users::Column::FirstName)
            .all(self.conn)
            .await
            .context("Failed to list users by role")?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn count_by_role(&self, role: UserRole) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .count(self.conn)
            .await
            .context("Failed to count users by role")
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the argon2 crate's default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash string.
///
/// Parameters are read from the hash itself, so hashes made with older
/// settings keep verifying.
pub fn verify_password_hash(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a random token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
