//! Session lifecycle against the scripted backend

use std::sync::{atomic::Ordering, Arc};

use opac_portal::{
    api::ApiRequest,
    error::AppError,
    models::{CredentialPair, ProfileUpdate, RegistrationFields, Role, SessionState},
    services::{AuthSessionManager, FileSessionStore, MemorySessionStore, SessionStore},
};

use crate::support::{identity, FakeBackend};

fn manager(backend: &Arc<FakeBackend>, store: &Arc<MemorySessionStore>) -> AuthSessionManager {
    AuthSessionManager::new(backend.clone(), store.clone())
}

#[tokio::test]
async fn test_login_then_bootstrap_on_fresh_manager() {
    let backend = FakeBackend::seeded();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let first = AuthSessionManager::new(backend.clone(), Arc::new(FileSessionStore::new(&path)));
    first.bootstrap().await;
    let user = first.login("librarian@library.test", "password123").await.unwrap();
    assert!(FileSessionStore::new(&path).load().is_some());

    // a new process picks the session up from disk without logging in again
    let second = AuthSessionManager::new(backend.clone(), Arc::new(FileSessionStore::new(&path)));
    assert!(second.state().is_loading);
    second.bootstrap().await;

    assert_eq!(second.state(), SessionState::authenticated(user));
    assert_eq!(backend.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_credentials_change_nothing() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;

    let err = session.login("bad@x.com", "wrong").await.unwrap_err();

    assert!(matches!(err, AppError::Authentication(_)));
    assert_eq!(session.state(), SessionState::anonymous());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_failed_login_keeps_previous_session() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;

    session.login("student@library.test", "password123").await.unwrap();
    let before = (session.state(), store.load());

    session.login("admin@library.test", "wrong").await.unwrap_err();

    assert_eq!((session.state(), store.load()), before);
}

#[tokio::test]
async fn test_register_creates_student_session() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;

    let mismatched = RegistrationFields {
        email: "new@library.test".into(),
        username: "newbie".into(),
        full_name: "New Reader".into(),
        password: "longpassword".into(),
        password_confirm: "longpassw0rd".into(),
    };
    assert!(matches!(
        session.register(&mismatched).await.unwrap_err(),
        AppError::Validation(_)
    ));
    assert!(store.load().is_none());

    let fields = RegistrationFields {
        password_confirm: "longpassword".into(),
        ..mismatched
    };
    let user = session.register(&fields).await.unwrap();
    assert_eq!(user.role, Role::Student);
    assert_eq!(session.identity(), Some(user));
    assert!(store.load().is_some());
}

#[tokio::test]
async fn test_logout_twice() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;
    session.login("admin@library.test", "password123").await.unwrap();

    session.logout().await;
    session.logout().await;

    assert_eq!(session.state(), SessionState::anonymous());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_expired_token_refreshed_and_retried() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;
    let user = session.login("student@library.test", "password123").await.unwrap();
    let old = store.load().unwrap();

    backend.expire_access_tokens();
    let value = session
        .authorized_request(ApiRequest::get("borrowing/my-current-borrows/"))
        .await
        .unwrap();

    assert_eq!(value["user"], user.id);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    // initial attempt plus exactly one retry
    assert_eq!(backend.send_calls.load(Ordering::SeqCst), 2);
    let renewed = store.load().unwrap();
    assert_ne!(renewed.access_token, old.access_token);
    assert_eq!(renewed.refresh_token, old.refresh_token);
    assert_eq!(session.identity(), Some(user));
}

#[tokio::test]
async fn test_failed_refresh_signs_out() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;
    session.login("student@library.test", "password123").await.unwrap();
    let mut changes = session.subscribe();

    backend.expire_access_tokens();
    backend.reject_refresh();
    let err = session
        .authorized_request(ApiRequest::get("borrowing/my-borrows/"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Authentication(_)));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.send_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), SessionState::anonymous());
    assert!(store.load().is_none());
    assert!(changes.has_changed().unwrap());
}

#[tokio::test]
async fn test_bootstrap_with_rejected_token() {
    let backend = FakeBackend::seeded();
    backend.reject_refresh();
    let store = Arc::new(MemorySessionStore::with_pair(CredentialPair::new(
        "access-from-last-week",
        "refresh-from-last-week",
    )));
    let session = manager(&backend, &store);

    session.bootstrap().await;

    assert_eq!(session.state(), SessionState::anonymous());
    assert!(store.load().is_none());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bootstrap_refreshes_expired_access_token() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let first = manager(&backend, &store);
    first.bootstrap().await;
    first.login("admin@library.test", "password123").await.unwrap();

    backend.expire_access_tokens();
    let second = manager(&backend, &store);
    second.bootstrap().await;

    assert_eq!(second.state(), SessionState::authenticated(identity(1, Role::Admin)));
    assert_eq!(backend.profile_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_late_bootstrap_after_teardown_is_ignored() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let seed = manager(&backend, &store);
    seed.bootstrap().await;
    seed.login("librarian@library.test", "password123").await.unwrap();

    let gate = backend.gate_next_call();
    let session = Arc::new(manager(&backend, &store));
    let task = tokio::spawn({
        let session = session.clone();
        async move { session.bootstrap().await }
    });

    gate.entered.notified().await;
    session.teardown().await;
    gate.release.notify_one();
    task.await.unwrap();

    assert!(session.state().is_loading);
    assert!(session.identity().is_none());
}

#[tokio::test]
async fn test_newer_login_wins() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = Arc::new(manager(&backend, &store));
    session.bootstrap().await;

    let gate = backend.gate_next_call();
    let slow = tokio::spawn({
        let session = session.clone();
        async move { session.login("admin@library.test", "password123").await }
    });
    gate.entered.notified().await;

    let student = session.login("student@library.test", "password123").await.unwrap();
    gate.release.notify_one();

    let stale = slow.await.unwrap();
    assert!(matches!(stale, Err(AppError::Superseded(_))));
    assert_eq!(session.identity(), Some(student));
    assert!(store.load().is_some());
}

#[tokio::test]
async fn test_logout_cancels_login_in_flight() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = Arc::new(manager(&backend, &store));
    session.bootstrap().await;

    let gate = backend.gate_next_call();
    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.login("admin@library.test", "password123").await }
    });
    gate.entered.notified().await;

    session.logout().await;
    gate.release.notify_one();

    assert!(pending.await.unwrap().is_err());
    assert_eq!(session.state(), SessionState::anonymous());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_profile_save_after_relogin_is_dropped() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = Arc::new(manager(&backend, &store));
    session.bootstrap().await;
    session.login("student@library.test", "password123").await.unwrap();

    let gate = backend.gate_next_call();
    let pending = tokio::spawn({
        let session = session.clone();
        async move {
            let changes = ProfileUpdate {
                full_name: Some("Renamed Student".into()),
                ..ProfileUpdate::default()
            };
            session.update_profile(&changes).await
        }
    });
    gate.entered.notified().await;

    session.logout().await;
    let admin = session.login("admin@library.test", "password123").await.unwrap();
    gate.release.notify_one();

    let stale = pending.await.unwrap();
    assert!(matches!(stale, Err(AppError::Superseded(_))));
    assert_eq!(session.identity(), Some(admin.clone()));
    assert_eq!(session.state().role(), Some(Role::Admin));

    // the stored credentials still belong to the identity on display
    let value = session
        .authorized_request(ApiRequest::get("auth/profile/"))
        .await
        .unwrap();
    assert_eq!(value["user"], admin.id);
}

#[tokio::test]
async fn test_profile_save_updates_identity() {
    let backend = FakeBackend::seeded();
    let store = Arc::new(MemorySessionStore::new());
    let session = manager(&backend, &store);
    session.bootstrap().await;
    session.login("librarian@library.test", "password123").await.unwrap();

    let changes = ProfileUpdate {
        full_name: Some("Head Librarian".into()),
        ..ProfileUpdate::default()
    };
    let updated = session.update_profile(&changes).await.unwrap();

    assert_eq!(updated.name(), "Head Librarian");
    assert_eq!(updated.role, Role::Librarian);
    assert_eq!(session.identity(), Some(updated));
}

#[tokio::test]
async fn test_unwritable_session_file_keeps_user_signed_out() {
    let backend = FakeBackend::seeded();
    let blocker = tempfile::NamedTempFile::new().unwrap();
    // a regular file where the session directory should be
    let path = blocker.path().join("session.json");
    let session = AuthSessionManager::new(backend.clone(), Arc::new(FileSessionStore::new(&path)));
    session.bootstrap().await;

    let err = session
        .login("student@library.test", "password123")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Server(_)));
    assert_eq!(session.state(), SessionState::anonymous());
    assert!(FileSessionStore::new(&path).load().is_none());
}
