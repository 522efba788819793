//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::config::SecurityConfig;
use crate::constants::{SYSTEM_ACTOR, lockout};
use crate::db::{AuditFilter, Store, StoreError, StoredUser};
use crate::domain::{Account, AuditEvent, AuditKind, Role, Session, UserId, timestamp_now};
use crate::security::{
    CredentialHasher, HashError, PasswordDigest, Salt, StoredCredential, generate_salt,
    valid_password, valid_username,
};
use crate::services::access_gate::AccessGate;
use crate::services::audit::{AuditLog, SeaOrmAuditLog};
use crate::services::auth_service::{AccessError, AuthError, AuthService};

pub struct SeaOrmAuthService {
    store: Store,
    hasher: CredentialHasher,
    audit: Arc<dyn AuditLog>,
    gate: AccessGate,
    session: RwLock<Option<Session>>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    auto_migrate_hashes: bool,
}

impl SeaOrmAuthService {
    pub fn new(store: Store, config: &SecurityConfig) -> Result<Self, HashError> {
        let audit: Arc<dyn AuditLog> = Arc::new(SeaOrmAuditLog::new(store.clone()));
        Self::with_audit_log(store, config, audit)
    }

    /// Builds the service around a caller-supplied audit sink.
    pub fn with_audit_log(
        store: Store,
        config: &SecurityConfig,
        audit: Arc<dyn AuditLog>,
    ) -> Result<Self, HashError> {
        Ok(Self {
            store,
            hasher: CredentialHasher::new(config)?,
            gate: AccessGate::new(Arc::clone(&audit)),
            audit,
            session: RwLock::new(None),
            user_locks: Mutex::new(HashMap::new()),
            auto_migrate_hashes: config.auto_migrate_password_hashes,
        })
    }

    /// Serializes credential checks and counter updates for one username.
    async fn lock_username(&self, username: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(username.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn audit(&self, kind: AuditKind, actor: &str, description: &str) -> Result<(), AuthError> {
        self.audit
            .record(kind, actor, description)
            .await
            .map_err(|e| {
                error!(error = %e, actor, "Audit write failed, denying operation");
                AuthError::Internal
            })
    }

    /// Logs `err` locally, records a sanitized `ERROR` audit event and
    /// returns the opaque internal error.
    async fn internal(&self, context: &str, err: impl Display) -> AuthError {
        error!(error = %err, "{context}");
        if let Err(audit_err) = self
            .audit
            .record(AuditKind::Error, SYSTEM_ACTOR, context)
            .await
        {
            error!(error = %audit_err, "Failed to audit internal error");
        }
        AuthError::Internal
    }

    async fn hash_password(&self, password: &str, salt: Salt) -> Result<PasswordDigest, HashError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        task::spawn_blocking(move || hasher.hash(&password, &salt))
            .await
            .map_err(|e| HashError::Unavailable(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(
        &self,
        password: &str,
        credential: StoredCredential,
    ) -> Result<bool, HashError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        task::spawn_blocking(move || hasher.verify(&password, &credential))
            .await
            .map_err(|e| HashError::Unavailable(format!("verification task failed: {e}")))?
    }

    async fn burn_hash(&self, password: &str) {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        if let Err(e) = task::spawn_blocking(move || hasher.burn(&password)).await {
            warn!(error = %e, "Dummy hash task failed");
        }
    }

    async fn new_credential(&self, password: &str) -> Result<StoredCredential, HashError> {
        let salt = generate_salt();
        let digest = self.hash_password(password, salt.clone()).await?;
        Ok(StoredCredential { digest, salt })
    }

    /// Shared path for self-registration and administrator-created accounts.
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        role: Role,
        actor: &str,
    ) -> Result<UserId, AuthError> {
        if !valid_username(username) || !valid_password(password) {
            self.audit(AuditKind::Error, SYSTEM_ACTOR, "Invalid registration attempt")
                .await?;
            return Err(AuthError::InvalidInput);
        }

        let duplicate = format!("Registration attempt with existing username: {username}");

        match self.store.find_account(username).await {
            Ok(Some(_)) => {
                self.audit(AuditKind::Warning, SYSTEM_ACTOR, &duplicate)
                    .await?;
                return Err(AuthError::DuplicateUsername);
            }
            Ok(None) => {}
            Err(e) => {
                return Err(self
                    .internal(&format!("Registration error for user: {username}"), e)
                    .await);
            }
        }

        let credential = match self.new_credential(password).await {
            Ok(credential) => credential,
            Err(e) => {
                return Err(self
                    .internal("Password hashing failed during registration", e)
                    .await);
            }
        };

        let id = match self
            .store
            .insert_user(username, &credential, role, &timestamp_now())
            .await
        {
            Ok(id) => id,
            Err(StoreError::DuplicateUsername) => {
                self.audit(AuditKind::Warning, SYSTEM_ACTOR, &duplicate)
                    .await?;
                return Err(AuthError::DuplicateUsername);
            }
            Err(e) => {
                return Err(self
                    .internal(&format!("Registration error for user: {username}"), e)
                    .await);
            }
        };

        if actor == username {
            self.audit(AuditKind::Success, username, "User registration successful")
                .await?;
        } else {
            self.audit(
                AuditKind::Success,
                actor,
                &format!("Created user {username} with role {role}"),
            )
            .await?;
        }

        info!(user = %username, id = %id, role = %role, "Account created");
        Ok(id)
    }

    /// Counts one failed password check against `username`. Returns whether
    /// the account is now locked.
    async fn record_failed_attempt(
        &self,
        username: &str,
        description: &str,
    ) -> Result<bool, AuthError> {
        let attempt = match self
            .store
            .increment_login_attempts(username, &timestamp_now())
            .await
        {
            Ok(attempt) => attempt,
            Err(e) => {
                return Err(self
                    .internal(&format!("Failed to record login attempt for user: {username}"), e)
                    .await);
            }
        };

        debug!(user = %username, attempts = attempt.attempts, "Failed login attempt recorded");

        // Only the failure that crossed the threshold reports the lock.
        if attempt.locked && attempt.attempts == lockout::THRESHOLD {
            self.audit(
                AuditKind::Warning,
                username,
                "Account locked due to excessive failed login attempts",
            )
            .await?;
        }

        self.audit(AuditKind::Warning, username, description)
            .await?;

        Ok(attempt.locked)
    }

    /// Replaces a digest produced under older hashing parameters. Failures
    /// are logged and otherwise ignored; the login has already succeeded.
    async fn upgrade_hash(&self, username: &str, password: &str, current: &PasswordDigest) {
        if !self.auto_migrate_hashes || !self.hasher.needs_rehash(current) {
            return;
        }

        let credential = match self.new_credential(password).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(user = %username, error = %e, "Password rehash failed");
                return;
            }
        };

        match self
            .store
            .update_user_credential(username, &credential, None)
            .await
        {
            Ok(()) => info!(user = %username, "Password hash upgraded to current parameters"),
            Err(e) => warn!(user = %username, error = %e, "Failed to store upgraded password hash"),
        }
    }

    /// The current session if it belongs to an administrator.
    async fn require_admin(&self) -> Result<Session, AuthError> {
        let session = self.current_session().await;
        self.gate
            .require(session.as_ref(), Role::Administrator)
            .await?;
        session.ok_or(AuthError::Access(AccessError::NotAuthenticated))
    }

    async fn load_user(&self, username: &str, context: &str) -> Result<StoredUser, AuthError> {
        match self.store.find_user(username).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AuthError::UserNotFound),
            Err(e) => Err(self.internal(context, e).await),
        }
    }

    async fn check_update(
        &self,
        username: &str,
        context: &str,
        result: Result<(), StoreError>,
    ) -> Result<(), AuthError> {
        match result {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => Err(self
                .internal(&format!("{context} for user: {username}"), e)
                .await),
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.create_account(username, password, Role::Client, username)
            .await
            .map(|_| ())
    }

    async fn register_with_confirmation(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        if password != confirmation {
            self.audit(
                AuditKind::Error,
                SYSTEM_ACTOR,
                "Invalid registration attempt - password confirmation mismatch",
            )
            .await?;
            return Err(AuthError::InvalidInput);
        }
        self.register(username, password).await
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if !valid_username(username) || password.trim().is_empty() {
            self.audit(
                AuditKind::Warning,
                SYSTEM_ACTOR,
                "Invalid authentication attempt - malformed credentials",
            )
            .await?;
            return Err(AuthError::InvalidInput);
        }

        let _guard = self.lock_username(username).await;

        let user = match self.store.find_user(username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.burn_hash(password).await;
                self.audit(
                    AuditKind::Warning,
                    username,
                    "Failed login attempt - user not found",
                )
                .await?;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                return Err(self
                    .internal(&format!("Authentication error for user: {username}"), e)
                    .await);
            }
        };

        if user.account.locked {
            self.audit(AuditKind::Warning, username, "Login attempt on locked account")
                .await?;
            return Err(AuthError::AccountLocked);
        }

        let matches = match self
            .verify_password(password, user.credential.clone())
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                return Err(self
                    .internal(&format!("Password verification failed for user: {username}"), e)
                    .await);
            }
        };

        if matches {
            match self.store.reset_login_attempts_if_unlocked(username).await {
                Ok(true) => {}
                Ok(false) => {
                    self.audit(AuditKind::Warning, username, "Login attempt on locked account")
                        .await?;
                    return Err(AuthError::AccountLocked);
                }
                Err(e) => {
                    return Err(self
                        .internal(&format!("Failed to reset login attempts for user: {username}"), e)
                        .await);
                }
            }

            self.upgrade_hash(username, password, &user.credential.digest)
                .await;

            self.audit(AuditKind::Success, username, "User login successful")
                .await?;

            let session = Session::from(&user.account);
            *self.session.write().await = Some(session.clone());

            info!(user = %username, role = %session.role, "User logged in");
            return Ok(session);
        }

        self.record_failed_attempt(username, "Failed login attempt - incorrect password")
            .await?;

        Err(AuthError::InvalidCredentials)
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.session.write().await.take();
        if let Some(session) = previous {
            self.audit(AuditKind::Info, &session.username, "User logged out")
                .await?;
            info!(user = %session.username, "User logged out");
        }
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn require(&self, required: Role) -> Result<(), AccessError> {
        let session = self.current_session().await;
        self.gate.require(session.as_ref(), required).await
    }

    async fn audit_read(&self) -> Result<Vec<AuditEvent>, AuthError> {
        self.audit_query(&AuditFilter::default()).await
    }

    async fn audit_query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuthError> {
        self.require_admin().await?;
        match self.audit.read(filter).await {
            Ok(events) => Ok(events),
            Err(e) => Err(self.internal("Failed to read audit log", e).await),
        }
    }

    async fn audit_page(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), AuthError> {
        self.require_admin().await?;
        match self.audit.read_page(filter, page, page_size).await {
            Ok(page) => Ok(page),
            Err(e) => Err(self.internal("Failed to read audit log", e).await),
        }
    }

    async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(session) = self.current_session().await else {
            return Err(AccessError::NotAuthenticated.into());
        };
        let username = session.username.as_str();

        if !valid_password(new_password) || current_password == new_password {
            self.audit(
                AuditKind::Warning,
                username,
                "Password change rejected - new password does not meet requirements",
            )
            .await?;
            return Err(AuthError::InvalidInput);
        }

        let _guard = self.lock_username(username).await;

        let user = self
            .load_user(username, &format!("Password change error for user: {username}"))
            .await?;

        if user.account.locked {
            *self.session.write().await = None;
            self.audit(AuditKind::Warning, username, "Password change attempt on locked account")
                .await?;
            return Err(AuthError::AccountLocked);
        }

        let matches = match self
            .verify_password(current_password, user.credential.clone())
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                return Err(self
                    .internal(&format!("Password verification failed for user: {username}"), e)
                    .await);
            }
        };

        if !matches {
            let locked = self
                .record_failed_attempt(
                    username,
                    "Password change failed - incorrect current password",
                )
                .await?;
            if locked {
                *self.session.write().await = None;
                info!(user = %username, "Session ended after account lock");
            }
            return Err(AuthError::InvalidCredentials);
        }

        match self.store.reset_login_attempts_if_unlocked(username).await {
            Ok(true) => {}
            Ok(false) => {
                *self.session.write().await = None;
                self.audit(AuditKind::Warning, username, "Password change attempt on locked account")
                    .await?;
                return Err(AuthError::AccountLocked);
            }
            Err(e) => {
                return Err(self
                    .internal(&format!("Failed to reset login attempts for user: {username}"), e)
                    .await);
            }
        }

        let credential = match self.new_credential(new_password).await {
            Ok(credential) => credential,
            Err(e) => {
                return Err(self
                    .internal("Password hashing failed during password change", e)
                    .await);
            }
        };

        let now = timestamp_now();
        let result = self
            .store
            .update_user_credential(username, &credential, Some(&now))
            .await;
        self.check_update(username, "Password change error", result)
            .await?;

        self.audit(AuditKind::Info, username, "Password changed")
            .await?;
        info!(user = %username, "Password changed");
        Ok(())
    }

    async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        let admins = match self.store.count_users_with_role(Role::Administrator).await {
            Ok(count) => count,
            Err(e) => return Err(self.internal("Administrator bootstrap error", e).await),
        };

        if admins > 0 {
            self.audit(
                AuditKind::Warning,
                SYSTEM_ACTOR,
                "Administrator bootstrap refused - an administrator already exists",
            )
            .await?;
            return Err(AuthError::AdministratorExists);
        }

        self.create_account(username, password, Role::Administrator, SYSTEM_ACTOR)
            .await
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserId, AuthError> {
        let admin = self.require_admin().await?;
        self.create_account(username, password, role, &admin.username)
            .await
    }

    async fn list_users(&self) -> Result<Vec<Account>, AuthError> {
        self.require_admin().await?;
        match self.store.list_accounts().await {
            Ok(accounts) => Ok(accounts),
            Err(e) => Err(self.internal("Failed to list users", e).await),
        }
    }

    async fn remove_user(&self, username: &str) -> Result<(), AuthError> {
        let admin = self.require_admin().await?;
        if admin.username == username {
            return Err(AuthError::InvalidInput);
        }

        let _guard = self.lock_username(username).await;

        match self.store.delete_user(username).await {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::UserNotFound),
            Err(e) => {
                return Err(self
                    .internal(&format!("Failed to delete user: {username}"), e)
                    .await);
            }
        }

        self.audit(
            AuditKind::Info,
            SYSTEM_ACTOR,
            &format!("User deleted: {username} (by {})", admin.username),
        )
        .await?;
        info!(user = %username, admin = %admin.username, "User deleted");
        Ok(())
    }

    async fn unlock_user(&self, username: &str) -> Result<(), AuthError> {
        let admin = self.require_admin().await?;
        let _guard = self.lock_username(username).await;

        let result = self.store.unlock_user(username).await;
        self.check_update(username, "Unlock error", result).await?;

        self.audit(
            AuditKind::Info,
            &admin.username,
            &format!("Account unlocked: {username}"),
        )
        .await?;
        info!(user = %username, admin = %admin.username, "Account unlocked");
        Ok(())
    }

    async fn set_role(&self, username: &str, role: Role) -> Result<(), AuthError> {
        let admin = self.require_admin().await?;
        if admin.username == username && role != Role::Administrator {
            return Err(AuthError::InvalidInput);
        }

        let result = self.store.set_user_role(username, role).await;
        self.check_update(username, "Role change error", result)
            .await?;

        self.audit(
            AuditKind::Info,
            &admin.username,
            &format!("Role of {username} changed to {role}"),
        )
        .await?;
        info!(user = %username, role = %role, admin = %admin.username, "Role changed");
        Ok(())
    }
}
