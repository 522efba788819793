//! Self-service account commands

use secrecy::ExposeSecret;

use super::prompt::{failure, open_service, prompt_password, sign_in};
use crate::config::Config;
use crate::constants::credentials::{PASSWORD_MIN_LEN, USERNAME_MAX_LEN, USERNAME_MIN_LEN};
use crate::services::AuthService;

fn print_requirements() {
    println!(
        "Username: {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} letters, digits or underscores."
    );
    println!(
        "Password: at least {PASSWORD_MIN_LEN} characters with a lowercase letter, an uppercase letter and a digit."
    );
}

pub async fn cmd_register(config: &Config, username: &str) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let username = username.trim();

    print_requirements();
    let password = prompt_password("Password")?;
    let confirmation = prompt_password("Confirm password")?;

    service
        .register_with_confirmation(
            username,
            password.expose_secret(),
            confirmation.expose_secret(),
        )
        .await
        .map_err(failure)?;

    println!("✓ Registered {username}");
    Ok(())
}

pub async fn cmd_bootstrap_admin(config: &Config, username: &str) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let username = username.trim();

    print_requirements();
    let password = prompt_password("Password")?;
    let confirmation = prompt_password("Confirm password")?;
    if password.expose_secret() != confirmation.expose_secret() {
        anyhow::bail!("Passwords do not match");
    }

    let id = service
        .bootstrap_admin(username, password.expose_secret())
        .await
        .map_err(failure)?;

    println!("✓ Administrator {username} created (ID: {id})");
    Ok(())
}

pub async fn cmd_login(config: &Config, username: &str) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let session = sign_in(&service, username.trim()).await?;

    println!("✓ Logged in as {}", session.username);
    println!("  ID: {} | Role: {} ({})", session.id, session.role, session.role.level());

    service.logout().await.map_err(failure)?;
    Ok(())
}

pub async fn cmd_passwd(config: &Config, username: &str) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let username = username.trim();

    let current = prompt_password(&format!("Current password for {username}"))?;
    service
        .authenticate(username, current.expose_secret())
        .await
        .map_err(failure)?;

    let new_password = prompt_password("New password")?;
    let confirmation = prompt_password("Confirm new password")?;
    if new_password.expose_secret() != confirmation.expose_secret() {
        service.logout().await.map_err(failure)?;
        anyhow::bail!("Passwords do not match");
    }

    let result = service
        .change_password(current.expose_secret(), new_password.expose_secret())
        .await;
    service.logout().await.map_err(failure)?;
    result.map_err(failure)?;

    println!("✓ Password changed");
    Ok(())
}
