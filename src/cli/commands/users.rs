//! Administrator account management commands

use secrecy::ExposeSecret;

use super::prompt::{failure, open_service, prompt_password, sign_in};
use crate::config::Config;
use crate::domain::Role;
use crate::services::{AuthService, SeaOrmAuthService};

/// Opens the service with `admin` signed in. The role check itself happens
/// inside each service call.
async fn admin_service(config: &Config, admin: &str) -> anyhow::Result<SeaOrmAuthService> {
    let service = open_service(config).await?;
    sign_in(&service, admin.trim()).await?;
    Ok(service)
}

async fn finish(service: &SeaOrmAuthService) -> anyhow::Result<()> {
    service.logout().await.map_err(failure)
}

pub async fn cmd_users_list(config: &Config, admin: &str) -> anyhow::Result<()> {
    let service = admin_service(config, admin).await?;
    let result = service.list_users().await;
    finish(&service).await?;
    let accounts = result.map_err(failure)?;

    println!("Users ({} total)", accounts.len());
    println!("{:-<70}", "");

    for account in accounts {
        let status = if account.locked { "🔒" } else { "•" };
        println!("{} {} [{}]", status, account.username, account.role);
        println!(
            "  ID: {} | Failed attempts: {} | Created: {}",
            account.id, account.login_attempts, account.created_at
        );
        if let Some(last) = &account.last_login_attempt {
            println!("  Last failed attempt: {last}");
        }
    }

    Ok(())
}

pub async fn cmd_users_add(
    config: &Config,
    admin: &str,
    username: &str,
    role: Role,
) -> anyhow::Result<()> {
    let service = admin_service(config, admin).await?;
    let username = username.trim();

    let result = async {
        let password = prompt_password(&format!("Password for new user {username}"))?;
        service
            .create_user(username, password.expose_secret(), role)
            .await
            .map_err(failure)
    }
    .await;
    finish(&service).await?;
    let id = result?;

    println!("✓ Created {username} as {role} (ID: {id})");
    Ok(())
}

pub async fn cmd_users_remove(config: &Config, admin: &str, username: &str) -> anyhow::Result<()> {
    let service = admin_service(config, admin).await?;
    let username = username.trim();

    println!("Delete user '{username}'?");
    println!("Enter 'y' to confirm, anything else to cancel:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if !input.trim().eq_ignore_ascii_case("y") {
        finish(&service).await?;
        println!("Cancelled.");
        return Ok(());
    }

    let result = service.remove_user(username).await;
    finish(&service).await?;
    result.map_err(failure)?;

    println!("✓ Removed: {username}");
    Ok(())
}

pub async fn cmd_users_unlock(config: &Config, admin: &str, username: &str) -> anyhow::Result<()> {
    let service = admin_service(config, admin).await?;
    let username = username.trim();

    let result = service.unlock_user(username).await;
    finish(&service).await?;
    result.map_err(failure)?;

    println!("✓ Unlocked: {username}");
    Ok(())
}

pub async fn cmd_users_role(
    config: &Config,
    admin: &str,
    username: &str,
    role: Role,
) -> anyhow::Result<()> {
    let service = admin_service(config, admin).await?;
    let username = username.trim();

    let result = service.set_role(username, role).await;
    finish(&service).await?;
    result.map_err(failure)?;

    println!("✓ {username} is now {role}");
    Ok(())
}
