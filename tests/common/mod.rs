use axum::Router;
use intl_portal::{
    AppConfig, AppState, Catalogs, MockIdentityProvider, MockRepository, ProviderState,
    RepositoryState, create_router,
    models::{AuthenticatedIdentity, Role, User},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Builds the full router (gate included) over the in-memory mocks, so tests
/// exercise exactly what production serves without Postgres or network access.
pub fn build_router(
    repo: Arc<MockRepository>,
    provider: MockIdentityProvider,
    config: AppConfig,
) -> Router {
    let state = AppState {
        repo: repo as RepositoryState,
        provider: Arc::new(provider) as ProviderState,
        catalogs: Arc::new(test_catalogs()),
        config,
    };
    create_router(state)
}

pub fn test_catalogs() -> Catalogs {
    Catalogs::from_value(
        vec![
            (
                "en",
                json!({
                    "Home": {"title": "Welcome", "body": "Hello"},
                    "About": {"title": "About", "body": "About us"},
                    "Contact": {"title": "Contact", "body": "Say hi"},
                    "Auth": {"signInTitle": "Sign in"},
                    "AuthError": {"title": "Error", "body": "Try again"},
                    "Dashboard": {"title": "Dashboard", "welcome": "Welcome, {name}!"},
                    "Admin": {"title": "Admin", "welcome": "Welcome, {name}!"}
                }),
            ),
            (
                "tr",
                json!({
                    "Home": {"title": "Hoş geldiniz", "body": "Merhaba"},
                    "Dashboard": {"title": "Panel", "welcome": "Hoş geldin, {name}!"}
                }),
            ),
        ],
        "en",
    )
}

pub fn seeded_user(email: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: Some("Seeded User".to_string()),
        image: None,
        provider: "google".to_string(),
        role,
        created_at: chrono::Utc::now(),
    }
}

pub fn identity(email: &str) -> AuthenticatedIdentity {
    AuthenticatedIdentity {
        email: email.to_string(),
        name: Some("Flow User".to_string()),
        image: Some("https://provider.example/avatar.png".to_string()),
        provider: "google".to_string(),
    }
}
