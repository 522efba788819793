//! CLI module - Command-line shell for Stockgate
//!
//! This module provides a structured CLI using clap for argument parsing.
//! Passwords are never accepted as arguments; every command that needs one
//! prompts on stdin.

mod commands;

use clap::{Parser, Subcommand};

use crate::domain::{AuditKind, Role};

/// Stockgate - Inventory access control
#[derive(Parser)]
#[command(name = "stockgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Register a new client account
    Register {
        /// Username (3-20 letters, digits or underscores)
        username: String,
    },

    /// Check credentials and show the resulting session
    Login {
        username: String,
    },

    /// Change your password
    Passwd {
        username: String,
    },

    /// Create the first administrator account
    BootstrapAdmin {
        username: String,
    },

    /// Manage user accounts (administrator only)
    Users {
        /// Administrator to authenticate as
        #[arg(long = "as", value_name = "ADMIN")]
        admin: String,

        #[command(subcommand)]
        command: UsersCommands,
    },

    /// Show the audit trail (administrator only)
    Logs {
        /// Administrator to authenticate as
        #[arg(long = "as", value_name = "ADMIN")]
        admin: String,

        /// Only events of this kind (info, success, warning, error)
        #[arg(long, value_parser = parse_kind)]
        kind: Option<AuditKind>,

        /// Only events recorded for this user
        #[arg(long)]
        actor: Option<String>,

        /// Page to show, starting at 1
        #[arg(long, default_value = "1")]
        page: u64,

        /// Events per page
        #[arg(long, default_value = "50")]
        page_size: u64,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// List all accounts
    #[command(alias = "ls")]
    List,

    /// Create an account with an explicit role
    Add {
        username: String,
        /// Role name or level (defaults to client)
        #[arg(long, default_value = "client")]
        role: Role,
    },

    /// Delete an account
    #[command(alias = "rm")]
    Remove {
        username: String,
    },

    /// Clear a lockout
    Unlock {
        username: String,
    },

    /// Change an account's role
    Role {
        username: String,
        /// Role name or level
        role: Role,
    },
}

fn parse_kind(s: &str) -> Result<AuditKind, String> {
    AuditKind::parse(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown event kind: {s}"))
}

pub use commands::*;
