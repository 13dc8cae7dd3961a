//! Navigation decisions driven by real session changes

use std::sync::Arc;

use opac_portal::{
    config::{AppConfig, FeaturesConfig},
    models::{Role, Route, RouteRequirement, SessionState},
    services::{
        default_route_for, evaluate, GuardDecision, GuardState, MemorySessionStore, RouteTable,
    },
    PortalContext,
};

use crate::support::{identity, FakeBackend};

fn portal(backend: &Arc<FakeBackend>) -> PortalContext {
    PortalContext::new(
        AppConfig::default(),
        backend.clone(),
        Arc::new(MemorySessionStore::new()),
    )
}

#[tokio::test]
async fn test_anonymous_visitor_sent_to_login() {
    let backend = FakeBackend::seeded();
    let portal = portal(&backend);

    let pending = portal.navigate("/librarian/loans");
    assert_eq!(pending.decision(), &GuardDecision::ShowLoading);

    portal.session.bootstrap().await;
    let navigation = portal.navigate("/librarian/loans");

    assert_eq!(navigation.route, Route::LibrarianHome);
    assert_eq!(navigation.outcome.state, GuardState::Unauthenticated);
    assert_eq!(
        navigation.outcome.decision,
        GuardDecision::RedirectToLogin {
            from: "/librarian/loans".into()
        }
    );
}

#[tokio::test]
async fn test_student_kept_out_of_admin_pages() {
    let backend = FakeBackend::seeded();
    let portal = portal(&backend);
    portal.session.bootstrap().await;
    portal
        .session
        .login("student@library.test", "password123")
        .await
        .unwrap();

    let navigation = portal.navigate("/admin/users");

    assert_eq!(navigation.outcome.state, GuardState::AuthenticatedUnauthorized);
    assert_eq!(
        navigation.outcome.decision,
        GuardDecision::Redirect {
            to: Route::StudentHome
        }
    );
    assert!(portal.navigate("/student/borrows").decision().is_render());
}

#[tokio::test]
async fn test_logout_flips_decision() {
    let backend = FakeBackend::seeded();
    let portal = portal(&backend);
    portal.session.bootstrap().await;
    portal
        .session
        .login("admin@library.test", "password123")
        .await
        .unwrap();
    assert!(portal.navigate("/admin").decision().is_render());
    assert_eq!(
        portal.navigate("/login").decision(),
        &GuardDecision::Redirect { to: Route::AdminHome }
    );

    let mut changes = portal.session.subscribe();
    portal.session.logout().await;

    changes.changed().await.unwrap();
    let session = changes.borrow_and_update().clone();
    let navigation = portal.routes.resolve("/admin", &session);
    assert!(matches!(
        navigation.outcome.decision,
        GuardDecision::RedirectToLogin { .. }
    ));
    assert!(portal.navigate("/login").decision().is_render());
}

#[tokio::test]
async fn test_landing_follows_role() {
    let backend = FakeBackend::seeded();
    let portal = portal(&backend);
    portal.session.bootstrap().await;

    assert_eq!(
        portal.navigate("/").decision(),
        &GuardDecision::Redirect { to: Route::Opac }
    );

    portal
        .session
        .login("librarian@library.test", "password123")
        .await
        .unwrap();
    assert_eq!(
        portal.navigate("/").decision(),
        &GuardDecision::Redirect {
            to: Route::LibrarianHome
        }
    );
}

#[test]
fn test_any_signed_in_role_passes_empty_role_set() {
    let requirement = RouteRequirement::authenticated();
    for role in [Role::Admin, Role::Librarian, Role::Student, Role::Unknown] {
        let session = SessionState::authenticated(identity(9, role));
        let outcome = evaluate(&session, &requirement, "/profile");
        assert_eq!(outcome.decision, GuardDecision::Render);
    }
}

#[test]
fn test_every_role_has_a_home() {
    assert_eq!(default_route_for(Some(Role::Admin)), Route::AdminHome);
    assert_eq!(default_route_for(Some(Role::Librarian)), Route::LibrarianHome);
    assert_eq!(default_route_for(Some(Role::Student)), Route::StudentHome);
    assert_eq!(default_route_for(Some(Role::Unknown)), Route::Opac);
    assert_eq!(default_route_for(None), Route::Opac);
}

#[test]
fn test_feature_switches() {
    let closed = RouteTable::portal(&FeaturesConfig {
        enable_registration: false,
        enable_guest_access: false,
    });
    let anonymous = SessionState::anonymous();

    assert_eq!(closed.resolve("/register", &anonymous).route, Route::NotFound);
    assert!(matches!(
        closed.resolve("/opac/search?q=rust", &anonymous).outcome.decision,
        GuardDecision::RedirectToLogin { .. }
    ));

    let open = RouteTable::default();
    assert_eq!(open.resolve("/register", &anonymous).route, Route::Register);
    assert!(open.resolve("/opac/search?q=rust", &anonymous).outcome.decision.is_render());
}
