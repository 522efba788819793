use super::prompt::{failure, open_service, sign_in};
use crate::config::Config;
use crate::db::AuditFilter;
use crate::domain::AuditKind;
use crate::services::AuthService;

pub struct LogsQuery {
    pub kind: Option<AuditKind>,
    pub actor: Option<String>,
    pub page: u64,
    pub page_size: u64,
    pub json: bool,
}

pub async fn cmd_logs(config: &Config, admin: &str, query: LogsQuery) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    sign_in(&service, admin.trim()).await?;

    let filter = AuditFilter {
        kind: query.kind,
        actor: query.actor,
    };
    let result = service
        .audit_page(&filter, query.page.max(1), query.page_size)
        .await;
    service.logout().await.map_err(failure)?;
    let (events, total_pages) = result.map_err(failure)?;

    if query.json {
        for event in &events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    if events.is_empty() {
        println!("No audit events.");
        return Ok(());
    }

    println!("Audit Log (page {} of {})", query.page.max(1), total_pages);
    println!("{:-<70}", "");

    for event in events {
        println!("[{}] {} {}", event.kind, event.timestamp, event.actor);
        println!("  {}", event.description);
    }

    Ok(())
}
