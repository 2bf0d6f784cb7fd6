mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{build_router, identity, seeded_user};
use intl_portal::{
    AppConfig, MockIdentityProvider, MockRepository, Repository, auth, models::Role,
};
use std::sync::Arc;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

// --- Sign-in callback ---

#[tokio::test]
async fn allow_listed_email_is_promoted_on_sign_in() {
    let repo = Arc::new(MockRepository::new());
    let config = AppConfig::default(); // allow-list contains admin@example.com
    let router = build_router(
        repo.clone(),
        MockIdentityProvider::returning(identity("admin@example.com")),
        config,
    );

    let response = router
        .oneshot(get("/auth/callback?code=abc&state=/tr/admin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/tr/admin");
    // The session cookie was issued.
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with(auth::SESSION_COOKIE));
    assert!(set_cookie.contains("HttpOnly"));

    // The subsequent role lookup must return administrator.
    assert_eq!(repo.get_role("admin@example.com").await, Some(Role::Admin));
}

#[tokio::test]
async fn unknown_email_signs_in_as_standard_user() {
    let repo = Arc::new(MockRepository::new());
    let router = build_router(
        repo.clone(),
        MockIdentityProvider::returning(identity("newcomer@example.com")),
        AppConfig::default(),
    );

    let response = router
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    // No callback path was carried through the flow, so the user lands on the dashboard.
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/dashboard");
    assert_eq!(repo.get_role("newcomer@example.com").await, Some(Role::User));
}

#[tokio::test]
async fn existing_user_keeps_their_stored_role() {
    // Promoted earlier by hand, not on the allow-list: sign-in must not demote.
    let repo = Arc::new(
        MockRepository::new().with_user(seeded_user("earned@example.com", Role::Admin)),
    );
    let router = build_router(
        repo.clone(),
        MockIdentityProvider::returning(identity("earned@example.com")),
        AppConfig::default(),
    );

    let response = router
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(repo.get_role("earned@example.com").await, Some(Role::Admin));
}

#[tokio::test]
async fn cross_provider_linking_requires_the_explicit_flag() {
    let mut existing = seeded_user("linked@example.com", Role::User);
    existing.provider = "github".to_string();
    let repo = Arc::new(MockRepository::new().with_user(existing));

    let mut config = AppConfig::default();
    config.allow_dangerous_email_linking = false;

    let router = build_router(
        repo.clone(),
        MockIdentityProvider::returning(identity("linked@example.com")),
        config,
    );

    let response = router
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/error");
    // The stored identity is untouched.
    let user = repo.get_user_by_email("linked@example.com").await.unwrap();
    assert_eq!(user.provider, "github");
}

#[tokio::test]
async fn cross_provider_linking_merges_when_allowed() {
    let mut existing = seeded_user("linked@example.com", Role::User);
    existing.provider = "github".to_string();
    let repo = Arc::new(MockRepository::new().with_user(existing));

    // Default test config opts into the linking behavior.
    let router = build_router(
        repo.clone(),
        MockIdentityProvider::returning(identity("linked@example.com")),
        AppConfig::default(),
    );

    let response = router
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let user = repo.get_user_by_email("linked@example.com").await.unwrap();
    assert_eq!(user.provider, "google");
}

#[tokio::test]
async fn provider_failure_degrades_to_the_error_page() {
    let router = build_router(
        Arc::new(MockRepository::new()),
        MockIdentityProvider::failing(),
        AppConfig::default(),
    );
    let response = router
        .oneshot(get("/auth/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/error");
}

#[tokio::test]
async fn callback_without_a_code_degrades_to_the_error_page() {
    let response = build_router(
        Arc::new(MockRepository::new()),
        MockIdentityProvider::default(),
        AppConfig::default(),
    )
    .oneshot(get("/auth/callback"))
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/error");
}

// --- Sign-out ---

#[tokio::test]
async fn signout_destroys_the_session_and_clears_the_cookie() {
    let user = seeded_user("viewer@example.com", Role::User);
    let user_id = user.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(user)
            .with_session("live-token", user_id),
    );
    let router = build_router(repo.clone(), MockIdentityProvider::default(), AppConfig::default());

    let cookie = format!("{}=live-token", auth::SESSION_COOKIE);
    let response = router
        .oneshot(get_with_cookie("/auth/signout", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    assert!(response.headers().get(header::SET_COOKIE).is_some());
    // The database session is gone; the token no longer resolves.
    assert!(repo.get_session_user("live-token").await.is_none());
}

#[tokio::test]
async fn signout_clears_both_cookie_variants() {
    let user = seeded_user("viewer@example.com", Role::User);
    let user_id = user.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(user)
            .with_session("plain-token", user_id)
            .with_session("secure-token", user_id),
    );
    let router = build_router(repo.clone(), MockIdentityProvider::default(), AppConfig::default());

    // A client can be left holding both variants (e.g. after an environment
    // switch); sign-out must clear whichever are present.
    let cookie = format!(
        "{}=plain-token; {}=secure-token",
        auth::SESSION_COOKIE,
        auth::SECURE_SESSION_COOKIE
    );
    let response = router
        .oneshot(get_with_cookie("/auth/signout", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let removals: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    let plain_prefix = format!("{}=", auth::SESSION_COOKIE);
    let secure_prefix = format!("{}=", auth::SECURE_SESSION_COOKIE);
    assert!(removals.iter().any(|c| c.starts_with(&plain_prefix)));
    assert!(removals.iter().any(|c| c.starts_with(&secure_prefix)));

    // Both database sessions are gone too.
    assert!(repo.get_session_user("plain-token").await.is_none());
    assert!(repo.get_session_user("secure-token").await.is_none());
}

// --- Profile API ---

#[tokio::test]
async fn me_requires_a_valid_session() {
    let user = seeded_user("viewer@example.com", Role::User);
    let user_id = user.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(user)
            .with_session("live-token", user_id),
    );
    let router = build_router(repo, MockIdentityProvider::default(), AppConfig::default());

    let response = router.clone().oneshot(get("/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = format!("{}=live-token", auth::SESSION_COOKIE);
    let response = router
        .oneshot(get_with_cookie("/me", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Role administration API ---

#[tokio::test]
async fn admins_can_promote_and_demote_by_email() {
    let admin = seeded_user("boss@example.com", Role::Admin);
    let admin_id = admin.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(admin)
            .with_user(seeded_user("plain@example.com", Role::User))
            .with_session("admin-token", admin_id),
    );
    let router = build_router(repo.clone(), MockIdentityProvider::default(), AppConfig::default());
    let cookie = format!("{}=admin-token", auth::SESSION_COOKIE);

    let promote = Request::builder()
        .method("POST")
        .uri("/admin/users/promote")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"plain@example.com"}"#))
        .unwrap();
    let response = router.clone().oneshot(promote).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(repo.get_role("plain@example.com").await, Some(Role::Admin));

    let demote = Request::builder()
        .method("POST")
        .uri("/admin/users/demote")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"plain@example.com"}"#))
        .unwrap();
    let response = router.clone().oneshot(demote).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(repo.get_role("plain@example.com").await, Some(Role::User));

    // Unknown email is a 404, not a silent success.
    let missing = Request::builder()
        .method("POST")
        .uri("/admin/users/promote")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"ghost@example.com"}"#))
        .unwrap();
    let response = router.oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_admins_get_forbidden_from_the_role_api() {
    let user = seeded_user("plain@example.com", Role::User);
    let user_id = user.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(user)
            .with_session("user-token", user_id),
    );
    let router = build_router(repo, MockIdentityProvider::default(), AppConfig::default());
    let cookie = format!("{}=user-token", auth::SESSION_COOKIE);

    let request = Request::builder()
        .method("POST")
        .uri("/admin/users/promote")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"plain@example.com"}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_lookup_by_email() {
    let admin = seeded_user("boss@example.com", Role::Admin);
    let admin_id = admin.id;
    let repo = Arc::new(
        MockRepository::new()
            .with_user(admin)
            .with_session("admin-token", admin_id),
    );
    let router = build_router(repo, MockIdentityProvider::default(), AppConfig::default());
    let cookie = format!("{}=admin-token", auth::SESSION_COOKIE);

    let response = router
        .oneshot(get_with_cookie(
            "/admin/users/boss@example.com/role",
            &cookie,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"\"admin\"");
}
