//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};

use crate::domain::UserRole;

/// Helpdesk - IT support ticketing service
#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "daemon", alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create an account with any role
    CreateUser {
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long, default_value = "customer")]
        role: UserRole,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// List all accounts
    #[command(alias = "ls")]
    ListUsers {
        /// Only show accounts with this role
        #[arg(long)]
        role: Option<UserRole>,
    },
}

pub use commands::*;
