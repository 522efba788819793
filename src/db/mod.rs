use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::{Account, AuditEvent, AuditKind, Role, UserId};
use crate::security::StoredCredential;

pub mod migrator;
pub mod repositories;

pub use repositories::StoreError;
pub use repositories::audit::AuditFilter;
pub use repositories::user::{FailedAttempt, StoredUser};

/// Owner of the database connection pool.
///
/// Cheap to clone; every clone shares the same pool. The auth service, the
/// credential store and the audit log are the only writers.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> anyhow::Result<Self> {
        Self::with_pool_options(db_url, 1, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> anyhow::Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        let store = Self { conn };
        store.apply_pragmas().await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(store)
    }

    /// Audit inserts must reach disk before an outcome is returned, so every
    /// commit is fsynced.
    async fn apply_pragmas(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        for pragma in ["PRAGMA synchronous = FULL", "PRAGMA foreign_keys = ON"] {
            self.conn
                .execute(Statement::from_string(backend, pragma.to_string()))
                .await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    pub async fn insert_user(
        &self,
        username: &str,
        credential: &StoredCredential,
        role: Role,
        now: &str,
    ) -> Result<UserId, StoreError> {
        self.user_repo()
            .insert(username, credential, role, now)
            .await
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        self.user_repo().find_by_username(username).await
    }

    pub async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.user_repo().find_account(username).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.user_repo().list_accounts().await
    }

    pub async fn count_users_with_role(&self, role: Role) -> Result<u64, StoreError> {
        self.user_repo().count_with_role(role).await
    }

    pub async fn increment_login_attempts(
        &self,
        username: &str,
        now: &str,
    ) -> Result<FailedAttempt, StoreError> {
        self.user_repo().increment_attempts(username, now).await
    }

    pub async fn reset_login_attempts_if_unlocked(&self, username: &str) -> Result<bool, StoreError> {
        self.user_repo().reset_attempts_if_unlocked(username).await
    }

    pub async fn set_user_locked(&self, username: &str, locked: bool) -> Result<(), StoreError> {
        self.user_repo().set_locked(username, locked).await
    }

    pub async fn unlock_user(&self, username: &str) -> Result<(), StoreError> {
        self.user_repo().unlock(username).await
    }

    pub async fn set_user_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        self.user_repo().set_role(username, role).await
    }

    pub async fn update_user_credential(
        &self,
        username: &str,
        credential: &StoredCredential,
        password_changed: Option<&str>,
    ) -> Result<(), StoreError> {
        self.user_repo()
            .update_credential(username, credential, password_changed)
            .await
    }

    pub async fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        self.user_repo().delete(username).await
    }

    pub async fn add_audit_event(
        &self,
        kind: AuditKind,
        actor: &str,
        description: &str,
        timestamp: &str,
    ) -> Result<i64, StoreError> {
        self.audit_repo()
            .add(kind, actor, description, timestamp)
            .await
    }

    pub async fn get_audit_events(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        self.audit_repo().get_all(filter).await
    }

    pub async fn get_audit_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), StoreError> {
        self.audit_repo().get_page(filter, page, page_size).await
    }
}
