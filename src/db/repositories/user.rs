use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
    sea_query::{Expr, SimpleExpr},
};

use super::StoreError;
use crate::constants::lockout;
use crate::domain::{Account, Role, UserId};
use crate::entities::users;
use crate::security::{PasswordDigest, Salt, StoredCredential};

/// A full user record. The credential half never leaves the auth service.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub account: Account,
    pub credential: StoredCredential,
}

/// Counter state right after a failed attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempt {
    pub attempts: i32,
    pub locked: bool,
}

impl TryFrom<&users::Model> for Account {
    type Error = StoreError;

    fn try_from(model: &users::Model) -> Result<Self, Self::Error> {
        let role = Role::try_from(model.role)
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", model.id)))?;

        Ok(Self {
            id: UserId::new(model.id),
            username: model.username.clone(),
            role,
            locked: model.locked,
            login_attempts: model.login_attempts,
            last_login_attempt: model.last_login_attempt.clone(),
            created_at: model.created_at.clone(),
            last_password_change: model.last_password_change.clone(),
        })
    }
}

impl TryFrom<users::Model> for StoredUser {
    type Error = StoreError;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        let account = Account::try_from(&model)?;
        let salt = Salt::from_b64(&model.salt)
            .map_err(|_| StoreError::Corrupt(format!("user {}: malformed salt", model.id)))?;

        Ok(Self {
            account,
            credential: StoredCredential {
                digest: PasswordDigest::from_phc(model.password_hash),
                salt,
            },
        })
    }
}

/// Credential store over the `users` table.
///
/// Every statement is built by the query builder with bound parameters.
pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user. Uniqueness is enforced by the `username` constraint,
    /// so concurrent registrations of one name cannot both succeed.
    pub async fn insert(
        &self,
        username: &str,
        credential: &StoredCredential,
        role: Role,
        now: &str,
    ) -> Result<UserId, StoreError> {
        let salt = credential
            .salt
            .to_b64()
            .map_err(|_| StoreError::Corrupt("salt encoding failed".to_string()))?;

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(credential.digest.expose_phc().to_string()),
            salt: Set(salt),
            role: Set(role.level()),
            locked: Set(false),
            login_attempts: Set(0),
            last_login_attempt: Set(None),
            created_at: Set(now.to_string()),
            last_password_change: Set(now.to_string()),
            ..Default::default()
        };

        let result = users::Entity::insert(active)
            .exec(&self.conn)
            .await
            .map_err(StoreError::from_insert)?;

        Ok(UserId::new(result.last_insert_id))
    }

    /// Get the full record (with credential) by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        model.map(StoredUser::try_from).transpose()
    }

    /// Get a user without credential fields
    pub async fn find_account(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        model.as_ref().map(Account::try_from).transpose()
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await?;

        models.iter().map(Account::try_from).collect()
    }

    pub async fn count_with_role(&self, role: Role) -> Result<u64, StoreError> {
        Ok(users::Entity::find()
            .filter(users::Column::Role.eq(role.level()))
            .count(&self.conn)
            .await?)
    }

    /// Record one failed login.
    ///
    /// The increment, the timestamp and the lock decision are a single
    /// `UPDATE`; the resulting counter is read back inside the same
    /// transaction. A crash can therefore never leave the counter at or above
    /// the threshold with the account still unlocked.
    pub async fn increment_attempts(
        &self,
        username: &str,
        now: &str,
    ) -> Result<FailedAttempt, StoreError> {
        let txn = self.conn.begin().await?;

        // SET expressions see the pre-update row, so `attempts + 1 >= THRESHOLD`
        // is written as `attempts >= THRESHOLD - 1`.
        let lock_expr = Expr::case(
            Expr::col(users::Column::LoginAttempts).gte(lockout::THRESHOLD - 1),
            true,
        )
        .finally(Expr::col(users::Column::Locked));

        let result = users::Entity::update_many()
            .col_expr(
                users::Column::LoginAttempts,
                Expr::col(users::Column::LoginAttempts).add(1),
            )
            .col_expr(users::Column::LastLoginAttempt, Expr::value(now.to_string()))
            .col_expr(users::Column::Locked, SimpleExpr::Case(Box::new(lock_expr)))
            .filter(users::Column::Username.eq(username))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(StoreError::NotFound);
        }

        let outcome = read_attempts(&txn, username).await?;
        txn.commit().await?;

        Ok(outcome)
    }

    /// Clears the counter only while the account is unlocked. Returns false
    /// if no unlocked row matched, so a lock committed by another connection
    /// after the caller read the row is never undone.
    pub async fn reset_attempts_if_unlocked(&self, username: &str) -> Result<bool, StoreError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::LoginAttempts, Expr::value(0))
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::Locked.eq(false))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn set_locked(&self, username: &str, locked: bool) -> Result<(), StoreError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Locked, Expr::value(locked))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await?;

        ensure_touched(result.rows_affected)
    }

    /// Clear the lock and the attempt counter together (`Locked -> Active(0)`).
    pub async fn unlock(&self, username: &str) -> Result<(), StoreError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Locked, Expr::value(false))
            .col_expr(users::Column::LoginAttempts, Expr::value(0))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await?;

        ensure_touched(result.rows_affected)
    }

    pub async fn set_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Role, Expr::value(role.level()))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await?;

        ensure_touched(result.rows_affected)
    }

    /// Replace the stored digest and salt.
    ///
    /// `password_changed` distinguishes a user-initiated change, which stamps
    /// `last_password_change`, from a transparent rehash of the same password.
    pub async fn update_credential(
        &self,
        username: &str,
        credential: &StoredCredential,
        password_changed: Option<&str>,
    ) -> Result<(), StoreError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?
            .ok_or(StoreError::NotFound)?;

        let salt = credential
            .salt
            .to_b64()
            .map_err(|_| StoreError::Corrupt("salt encoding failed".to_string()))?;

        let mut active: users::ActiveModel = model.into();
        active.password_hash = Set(credential.digest.expose_phc().to_string());
        active.salt = Set(salt);
        if let Some(now) = password_changed {
            active.last_password_change = Set(now.to_string());
        }
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Delete a user. Returns false if no such user existed.
    pub async fn delete(&self, username: &str) -> Result<bool, StoreError> {
        let result = users::Entity::delete_many()
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

async fn read_attempts<C>(conn: &C, username: &str) -> Result<FailedAttempt, StoreError>
where
    C: ConnectionTrait,
{
    let model = users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound)?;

    Ok(FailedAttempt {
        attempts: model.login_attempts,
        locked: model.locked,
    })
}

fn ensure_touched(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}
