use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;

use crate::config::Config;
use crate::db::Store;
use crate::domain::Session;
use crate::services::{AuthError, AuthService, SeaOrmAuthService};

/// Reads one line from stdin as a secret. The trailing newline is dropped,
/// other whitespace is kept.
pub fn prompt_password(label: &str) -> anyhow::Result<SecretString> {
    print!("{label}: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    Ok(SecretString::from(password))
}

pub async fn open_service(config: &Config) -> anyhow::Result<SeaOrmAuthService> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
    .with_context(|| format!("Failed to open database: {}", config.general.database_path))?;

    SeaOrmAuthService::new(store, &config.security).context("Invalid password hashing settings")
}

/// Prompts for `username`'s password and makes that user the current session.
pub async fn sign_in(service: &SeaOrmAuthService, username: &str) -> anyhow::Result<Session> {
    let password = prompt_password(&format!("Password for {username}"))?;
    service
        .authenticate(username, password.expose_secret())
        .await
        .map_err(failure)
}

/// Converts a service error into the uniform message shown to the user.
pub fn failure(err: AuthError) -> anyhow::Error {
    anyhow::anyhow!("{}", err.user_message())
}
