use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    /// One of `customer`, `support`, `admin`
    pub role: String,

    pub company: Option<String>,

    pub department: Option<String>,

    pub designation: Option<String>,

    pub phone: Option<String>,

    /// Single-use password reset token (64-char hex string)
    #[sea_orm(unique)]
    pub reset_token: Option<String>,

    pub reset_token_expires_at: Option<String>,

    /// Long-lived "remember me" token (64-char hex string)
    #[sea_orm(unique)]
    pub remember_token: Option<String>,

    pub remember_token_expires_at: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
