//! Operator account commands. These bypass the HTTP policy layer and talk to
//! the database directly.

use anyhow::Context;

use crate::config::Config;
use crate::db::Store;
use crate::domain::UserRole;
use crate::models::NewUser;
use crate::services::{AuthService, SeaOrmAuthService};

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
}

pub async fn cmd_create_user(
    config: &Config,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: UserRole,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            println!("Password for {email}:");
            let mut input = String::new();
            std::io::stdin()
                .read_line(&mut input)
                .context("Failed to read password")?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let store = open_store(config).await?;
    let auth = SeaOrmAuthService::new(store, config.security.clone());

    let user = auth
        .provision(NewUser {
            email: email.to_string(),
            password,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: Some(role),
            ..NewUser::default()
        })
        .await
        .map_err(|e| anyhow::anyhow!("Could not create user: {e}"))?;

    println!("✓ Created {} account {} (ID: {})", user.role, user.email, user.id);
    Ok(())
}

pub async fn cmd_list_users(config: &Config, role: Option<UserRole>) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let users = match role {
        Some(role) => store.users().list_by_role(role).await?,
        None => store.users().list_all().await?,
    };

    if users.is_empty() {
        println!("No users found.");
        println!();
        println!("Create one with: helpdesk create-user <email> --first-name <name> --last-name <name>");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        println!(
            "[{}] {} {} <{}>",
            user.id, user.first_name, user.last_name, user.email
        );
        println!("  Role: {} | Created: {}", user.role, user.created_at);
    }

    Ok(())
}
