use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
    Set,
};

use super::StoreError;
use crate::domain::{AuditEvent, AuditKind};
use crate::entities::{logs, prelude::*};

impl TryFrom<logs::Model> for AuditEvent {
    type Error = StoreError;

    fn try_from(model: logs::Model) -> Result<Self, Self::Error> {
        let kind = AuditKind::parse(&model.event).ok_or_else(|| {
            StoreError::Corrupt(format!("log {}: unknown event {}", model.id, model.event))
        })?;

        Ok(Self {
            id: model.id,
            kind,
            actor: model.username,
            description: model.description,
            timestamp: model.timestamp,
        })
    }
}

/// Optional filters for reading the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub kind: Option<AuditKind>,
    pub actor: Option<String>,
}

/// Append-only persistence for the `logs` table. There is no update or delete.
pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(
        &self,
        kind: AuditKind,
        actor: &str,
        description: &str,
        timestamp: &str,
    ) -> Result<i64, StoreError> {
        let active_model = logs::ActiveModel {
            event: Set(kind.as_str().to_string()),
            username: Set(actor.to_string()),
            description: Set(description.to_string()),
            timestamp: Set(timestamp.to_string()),
            ..Default::default()
        };

        let result = Logs::insert(active_model).exec(&self.conn).await?;
        Ok(result.last_insert_id)
    }

    /// Newest first, ties broken by insertion order.
    pub async fn get_all(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, StoreError> {
        let items = filtered(filter).all(&self.conn).await?;
        items.into_iter().map(AuditEvent::try_from).collect()
    }

    /// One page (1-based) of the filtered trail and the total page count.
    pub async fn get_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), StoreError> {
        let paginator = filtered(filter).paginate(&self.conn, page_size.max(1));
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        let events = items
            .into_iter()
            .map(AuditEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((events, total_pages))
    }
}

fn filtered(filter: &AuditFilter) -> Select<Logs> {
    let mut query = Logs::find()
        .order_by_desc(logs::Column::Timestamp)
        .order_by_desc(logs::Column::Id);

    if let Some(kind) = filter.kind {
        query = query.filter(logs::Column::Event.eq(kind.as_str()));
    }

    if let Some(actor) = &filter.actor {
        query = query.filter(logs::Column::Username.eq(actor.as_str()));
    }

    query
}
