pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod security;
pub mod services;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, LogsQuery, UsersCommands};
pub use config::{Config, LogFormat};
pub use db::Store;
pub use services::{AuthError, AuthService, SeaOrmAuthService};

pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    init_tracing(&config);

    match &config.source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    debug!(database = %config.general.database_path, "Database configured");

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Stockgate - Inventory access control");
        println!("Run 'stockgate --help' for the list of commands.");
        return Ok(());
    };

    match command {
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit stockgate.toml and run again.");
            } else {
                println!("Config file already exists.");
            }
            Ok(())
        }

        Commands::Register { username } => cli::cmd_register(&config, &username).await,

        Commands::Login { username } => cli::cmd_login(&config, &username).await,

        Commands::Passwd { username } => cli::cmd_passwd(&config, &username).await,

        Commands::BootstrapAdmin { username } => {
            cli::cmd_bootstrap_admin(&config, &username).await
        }

        Commands::Users { admin, command } => match command {
            UsersCommands::List => cli::cmd_users_list(&config, &admin).await,
            UsersCommands::Add { username, role } => {
                cli::cmd_users_add(&config, &admin, &username, role).await
            }
            UsersCommands::Remove { username } => {
                cli::cmd_users_remove(&config, &admin, &username).await
            }
            UsersCommands::Unlock { username } => {
                cli::cmd_users_unlock(&config, &admin, &username).await
            }
            UsersCommands::Role { username, role } => {
                cli::cmd_users_role(&config, &admin, &username, role).await
            }
        },

        Commands::Logs {
            admin,
            kind,
            actor,
            page,
            page_size,
            json,
        } => {
            let query = LogsQuery {
                kind,
                actor,
                page,
                page_size,
                json,
            };
            cli::cmd_logs(&config, &admin, query).await
        }
    }
}

/// Logs go to stderr so password prompts on stdout stay readable.
fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match config.general.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "Stockgate starting");
}
