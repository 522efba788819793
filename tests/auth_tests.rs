//! Integration tests for registration, login and the lockout policy.

use std::sync::Arc;

use async_trait::async_trait;
use stockgate::config::SecurityConfig;
use stockgate::db::{AuditFilter, Store, StoreError};
use stockgate::domain::{AuditEvent, AuditKind, Role};
use stockgate::services::{
    AuditError, AuditLog, AuthError, AuthService, SeaOrmAuditLog, SeaOrmAuthService,
};

fn fast_security() -> SecurityConfig {
    SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..SecurityConfig::default()
    }
}

async fn spawn_store() -> Store {
    let db_path =
        std::env::temp_dir().join(format!("stockgate-auth-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("Failed to open test database")
}

async fn spawn_service() -> (SeaOrmAuthService, Store) {
    let store = spawn_store().await;
    let service =
        SeaOrmAuthService::new(store.clone(), &fast_security()).expect("Failed to build service");
    (service, store)
}

async fn audit_events(store: &Store) -> Vec<AuditEvent> {
    store
        .get_audit_events(&AuditFilter::default())
        .await
        .expect("Failed to read audit log")
}

/// Audit sink whose writes always fail.
struct BrokenAuditLog;

#[async_trait]
impl AuditLog for BrokenAuditLog {
    async fn append(
        &self,
        _kind: AuditKind,
        _actor: &str,
        _description: &str,
        _timestamp: &str,
    ) -> Result<(), AuditError> {
        Err(AuditError::Write(StoreError::Corrupt("disk full".to_string())))
    }

    async fn read(&self, _filter: &AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }

    async fn read_page(
        &self,
        _filter: &AuditFilter,
        _page: u64,
        _page_size: u64,
    ) -> Result<(Vec<AuditEvent>, u64), AuditError> {
        Ok((Vec::new(), 0))
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let (service, _store) = spawn_service().await;

    service.register("alice_01", "Password1").await.unwrap();
    let session = service.authenticate("alice_01", "Password1").await.unwrap();

    assert_eq!(session.username, "alice_01");
    assert_eq!(session.role, Role::Client);
    assert_eq!(session.role.level(), 2);
    assert!(!session.locked);
    assert_eq!(service.current_session().await, Some(session));
}

#[tokio::test]
async fn test_duplicate_registration() {
    let (service, store) = spawn_service().await;

    service.register("alice_01", "Password1").await.unwrap();
    let err = service.register("alice_01", "Password2").await.unwrap_err();
    assert_eq!(err, AuthError::DuplicateUsername);

    let warnings = store
        .get_audit_events(&AuditFilter {
            kind: Some(AuditKind::Warning),
            actor: None,
        })
        .await
        .unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].actor, "SYSTEM");

    // The first password still works.
    service.authenticate("alice_01", "Password1").await.unwrap();
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let (service, store) = spawn_service().await;

    assert_eq!(
        service.register("ab", "Password1").await.unwrap_err(),
        AuthError::InvalidInput
    );
    assert_eq!(
        service.register("bob_02", "password1").await.unwrap_err(),
        AuthError::InvalidInput
    );
    assert_eq!(
        service.register(" bob_02", "Password1").await.unwrap_err(),
        AuthError::InvalidInput
    );

    let events = audit_events(&store).await;
    assert_eq!(events.len(), 3);
    assert!(
        events
            .iter()
            .all(|e| e.kind == AuditKind::Error && e.actor == "SYSTEM")
    );
    assert!(store.find_account("bob_02").await.unwrap().is_none());
}

#[tokio::test]
async fn test_register_with_confirmation_mismatch() {
    let (service, store) = spawn_service().await;

    let err = service
        .register_with_confirmation("dave_1", "Password1", "Password2")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidInput);
    assert!(store.find_account("dave_1").await.unwrap().is_none());

    service
        .register_with_confirmation("dave_1", "Password1", "Password1")
        .await
        .unwrap();
    assert!(store.find_account("dave_1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_lockout_after_three_failures() {
    let (service, store) = spawn_service().await;
    service.register("carol", "Str0ngPwd").await.unwrap();

    for attempt in 1..=3 {
        let err = service.authenticate("carol", "wrong1A").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials, "attempt {attempt}");
    }

    let account = store.find_account("carol").await.unwrap().unwrap();
    assert!(account.locked, "lock applies on the third failure");
    assert_eq!(account.login_attempts, 3);
    assert!(account.last_login_attempt.is_some());

    let err = service.authenticate("carol", "Str0ngPwd").await.unwrap_err();
    assert_eq!(err, AuthError::AccountLocked);
    assert_eq!(service.current_session().await, None);

    let locks = audit_events(&store)
        .await
        .into_iter()
        .filter(|e| e.description.contains("Account locked"))
        .count();
    assert_eq!(locks, 1);
}

#[tokio::test]
async fn test_two_failures_do_not_lock() {
    let (service, store) = spawn_service().await;
    service.register("carol", "Str0ngPwd").await.unwrap();

    for _ in 0..2 {
        service.authenticate("carol", "wrong1A").await.unwrap_err();
    }
    let account = store.find_account("carol").await.unwrap().unwrap();
    assert!(!account.locked);
    assert_eq!(account.login_attempts, 2);

    // Success resets the counter, so two more failures still do not lock.
    service.authenticate("carol", "Str0ngPwd").await.unwrap();
    assert_eq!(
        store
            .find_account("carol")
            .await
            .unwrap()
            .unwrap()
            .login_attempts,
        0
    );

    for _ in 0..2 {
        service.authenticate("carol", "wrong1A").await.unwrap_err();
    }
    assert!(!store.find_account("carol").await.unwrap().unwrap().locked);
}

#[tokio::test]
async fn test_unknown_user_is_invalid_credentials() {
    let (service, store) = spawn_service().await;

    let err = service
        .authenticate("ghost", "whatever1A")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);

    let events = audit_events(&store).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AuditKind::Warning);
    assert_eq!(events[0].actor, "ghost");
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let (service, _store) = spawn_service().await;
    service.register("alice_01", "Password1").await.unwrap();

    for wrong in ["Password2", "password1", "Password1 ", "x"] {
        let err = service.authenticate("alice_01", wrong).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        service.authenticate("alice_01", "Password1").await.unwrap();
        service.logout().await.unwrap();
    }
}

#[tokio::test]
async fn test_malformed_login_input() {
    let (service, store) = spawn_service().await;

    assert_eq!(
        service.authenticate("", "Password1").await.unwrap_err(),
        AuthError::InvalidInput
    );
    assert_eq!(
        service.authenticate("al", "Password1").await.unwrap_err(),
        AuthError::InvalidInput
    );
    assert_eq!(
        service.authenticate("alice_01", "").await.unwrap_err(),
        AuthError::InvalidInput
    );
    assert_eq!(
        service.authenticate("alice_01", "   ").await.unwrap_err(),
        AuthError::InvalidInput
    );

    let events = audit_events(&store).await;
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.kind == AuditKind::Warning));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (service, store) = spawn_service().await;
    service.register("alice_01", "Password1").await.unwrap();
    service.authenticate("alice_01", "Password1").await.unwrap();

    service.logout().await.unwrap();
    assert_eq!(service.current_session().await, None);

    let latest = &audit_events(&store).await[0];
    assert_eq!(latest.kind, AuditKind::Info);
    assert_eq!(latest.actor, "alice_01");
    assert_eq!(latest.description, "User logged out");

    // Logging out without a session records nothing.
    let before = audit_events(&store).await.len();
    service.logout().await.unwrap();
    assert_eq!(audit_events(&store).await.len(), before);
}

#[tokio::test]
async fn test_audit_never_contains_credentials() {
    let (service, store) = spawn_service().await;
    service.register("alice_01", "Password1").await.unwrap();
    service.authenticate("alice_01", "Wrong1pwd").await.unwrap_err();
    service.authenticate("alice_01", "Password1").await.unwrap();
    service.register("alice_01", "Password9").await.unwrap_err();

    let stored = store.find_user("alice_01").await.unwrap().unwrap();
    let digest = stored.credential.digest.expose_phc().to_string();
    let salt = stored.credential.salt.to_b64().unwrap();

    for event in audit_events(&store).await {
        for secret in ["Password1", "Wrong1pwd", "Password9", digest.as_str(), salt.as_str()] {
            assert!(
                !event.description.contains(secret),
                "audit event {} leaks credential material",
                event.id
            );
        }
    }
}

#[tokio::test]
async fn test_stored_digest_is_not_the_password() {
    let (service, store) = spawn_service().await;
    service.register("alice_01", "Password1").await.unwrap();
    service.register("bob_02", "Password1").await.unwrap();

    let alice = store.find_user("alice_01").await.unwrap().unwrap();
    let bob = store.find_user("bob_02").await.unwrap().unwrap();

    assert_ne!(alice.credential.digest.expose_phc(), "Password1");
    assert_ne!(alice.credential.salt, bob.credential.salt);
    assert_ne!(
        alice.credential.digest.expose_phc(),
        bob.credential.digest.expose_phc()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_lock_exactly_once() {
    let (service, store) = spawn_service().await;
    service.register("carol", "Str0ngPwd").await.unwrap();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.authenticate("carol", "wrong1A").await })
        })
        .collect();

    let mut invalid = 0;
    let mut locked = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap_err() {
            AuthError::InvalidCredentials => invalid += 1,
            AuthError::AccountLocked => locked += 1,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(invalid, 3);
    assert_eq!(locked, 3);

    let account = store.find_account("carol").await.unwrap().unwrap();
    assert!(account.locked);
    assert_eq!(account.login_attempts, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lock_from_another_connection_wins_over_login() {
    let db_url = format!(
        "sqlite:{}",
        std::env::temp_dir()
            .join(format!("stockgate-auth-test-{}.db", uuid::Uuid::new_v4()))
            .display()
    );
    let store = Store::new(&db_url).await.unwrap();
    let slow = SecurityConfig {
        argon2_memory_cost_kib: 16384,
        argon2_time_cost: 2,
        ..fast_security()
    };
    let service = Arc::new(SeaOrmAuthService::new(store.clone(), &slow).unwrap());
    service.register("carol", "Str0ngPwd").await.unwrap();

    let login = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.authenticate("carol", "Str0ngPwd").await })
    };

    // Another process locks the account while the password is being verified.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let other = Store::new(&db_url).await.unwrap();
    while !other
        .increment_login_attempts("carol", &stockgate::domain::timestamp_now())
        .await
        .unwrap()
        .locked
    {}

    let outcome = login.await.unwrap();
    let account = store.find_account("carol").await.unwrap().unwrap();
    assert!(account.locked);
    assert_eq!(account.login_attempts, 3);

    match outcome {
        Ok(session) => assert_eq!(service.current_session().await, Some(session)),
        Err(err) => {
            assert_eq!(err, AuthError::AccountLocked);
            assert_eq!(service.current_session().await, None);
        }
    }
}

#[tokio::test]
async fn test_wrong_current_password_counts_toward_lockout() {
    let (service, store) = spawn_service().await;
    service.register("carol", "Str0ngPwd").await.unwrap();
    service.authenticate("carol", "Str0ngPwd").await.unwrap();

    for attempt in 1..=3 {
        let err = service
            .change_password("wrong1A", "Newpass12")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials, "attempt {attempt}");
    }

    let account = store.find_account("carol").await.unwrap().unwrap();
    assert!(account.locked);
    assert_eq!(account.login_attempts, 3);
    assert_eq!(service.current_session().await, None);

    assert_eq!(
        service.authenticate("carol", "Str0ngPwd").await.unwrap_err(),
        AuthError::AccountLocked
    );

    let locks = audit_events(&store)
        .await
        .into_iter()
        .filter(|e| e.description.contains("Account locked"))
        .count();
    assert_eq!(locks, 1);
}

#[tokio::test]
async fn test_audit_failure_denies_login() {
    let store = spawn_store().await;
    let healthy = SeaOrmAuthService::new(store.clone(), &fast_security()).unwrap();
    healthy.register("alice_01", "Password1").await.unwrap();

    let broken = SeaOrmAuthService::with_audit_log(
        store.clone(),
        &fast_security(),
        Arc::new(BrokenAuditLog),
    )
    .unwrap();

    let err = broken
        .authenticate("alice_01", "Password1")
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::Internal);
    assert_eq!(broken.current_session().await, None);
}

#[tokio::test]
async fn test_custom_audit_log_receives_events() {
    let store = spawn_store().await;
    let audit = Arc::new(SeaOrmAuditLog::new(store.clone()));
    let service =
        SeaOrmAuthService::with_audit_log(store.clone(), &fast_security(), audit.clone()).unwrap();

    service.register("alice_01", "Password1").await.unwrap();

    let events = audit.read(&AuditFilter::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, AuditKind::Success);
    assert_eq!(events[0].actor, "alice_01");
}

#[tokio::test]
async fn test_login_upgrades_outdated_hash() {
    let store = spawn_store().await;
    let old = SeaOrmAuthService::new(store.clone(), &fast_security()).unwrap();
    old.register("alice_01", "Password1").await.unwrap();

    let stronger = SecurityConfig {
        argon2_memory_cost_kib: 2048,
        ..fast_security()
    };
    let current = SeaOrmAuthService::new(store.clone(), &stronger).unwrap();
    current.authenticate("alice_01", "Password1").await.unwrap();

    let stored = store.find_user("alice_01").await.unwrap().unwrap();
    assert!(stored.credential.digest.expose_phc().contains("m=2048"));

    // Both services still accept the password.
    old.authenticate("alice_01", "Password1").await.unwrap();
    current.authenticate("alice_01", "Password1").await.unwrap();
}

#[tokio::test]
async fn test_rehash_can_be_disabled() {
    let store = spawn_store().await;
    let old = SeaOrmAuthService::new(store.clone(), &fast_security()).unwrap();
    old.register("alice_01", "Password1").await.unwrap();

    let frozen = SecurityConfig {
        argon2_memory_cost_kib: 2048,
        auto_migrate_password_hashes: false,
        ..fast_security()
    };
    let service = SeaOrmAuthService::new(store.clone(), &frozen).unwrap();
    service.authenticate("alice_01", "Password1").await.unwrap();

    let stored = store.find_user("alice_01").await.unwrap().unwrap();
    assert!(stored.credential.digest.expose_phc().contains("m=1024"));
}

#[tokio::test]
async fn test_change_password() {
    let (service, store) = spawn_service().await;
    service.register("alice_01", "Password1").await.unwrap();

    assert_eq!(
        service
            .change_password("Password1", "Newpass12")
            .await
            .unwrap_err(),
        AuthError::Access(stockgate::services::AccessError::NotAuthenticated)
    );

    service.authenticate("alice_01", "Password1").await.unwrap();
    let before = store.find_account("alice_01").await.unwrap().unwrap();

    assert_eq!(
        service
            .change_password("Wrong1pwd", "Newpass12")
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    assert_eq!(
        service
            .change_password("Password1", "weak")
            .await
            .unwrap_err(),
        AuthError::InvalidInput
    );

    service
        .change_password("Password1", "Newpass12")
        .await
        .unwrap();
    service.logout().await.unwrap();

    assert_eq!(
        service
            .authenticate("alice_01", "Password1")
            .await
            .unwrap_err(),
        AuthError::InvalidCredentials
    );
    service.authenticate("alice_01", "Newpass12").await.unwrap();

    let after = store.find_account("alice_01").await.unwrap().unwrap();
    assert_ne!(after.last_password_change, before.last_password_change);
}
