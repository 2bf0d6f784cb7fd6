use crate::models::{AuthenticatedIdentity, Role, Session, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations: the user store and
/// the database-backed session store. Handlers and the auth extractor interact with
/// the data layer through this trait without knowing the concrete implementation
/// (Postgres in production, the in-memory mock in tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    // Sign-in entry point: creates the user on first sign-in, refreshes name/image
    // afterwards, and writes the role decided by the caller (allow-list promotion).
    async fn upsert_user(&self, identity: &AuthenticatedIdentity, role: Role) -> Option<User>;

    // --- Role Administration ---
    // Explicit promotion/demotion by email. Returns false if the email is unknown.
    async fn set_role(&self, email: &str, role: Role) -> bool;
    async fn get_role(&self, email: &str) -> Option<Role>;
    async fn get_admins(&self) -> Vec<User>;

    // --- Sessions ---
    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Option<Session>;
    // The session/role oracle: resolves an opaque token to the live user record,
    // enforcing expiry. Returns None for unknown, expired, or orphaned tokens.
    async fn get_session_user(&self, token: &str) -> Option<User>;
    async fn delete_session(&self, token: &str) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL
/// database (schema in `migrations/`). Queries are runtime-bound so the crate builds
/// without a live DATABASE_URL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, name, image, provider, role, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user error: {:?}", e);
            None
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_by_email error: {:?}", e);
            None
        })
    }

    /// upsert_user
    ///
    /// Creates the user on first sign-in; on subsequent sign-ins refreshes the
    /// provider-supplied display data and applies the caller's role decision.
    /// `ON CONFLICT (email)` implements the merge-by-email identity model.
    async fn upsert_user(&self, identity: &AuthenticatedIdentity, role: Role) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, image, provider, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                image = EXCLUDED.image,
                provider = EXCLUDED.provider,
                role = EXCLUDED.role
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(&identity.image)
        .bind(&identity.provider)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("upsert_user error: {:?}", e);
            None
        })
    }

    async fn set_role(&self, email: &str, role: Role) -> bool {
        match sqlx::query("UPDATE users SET role = $1 WHERE email = $2")
            .bind(role)
            .bind(email)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("set_role error: {:?}", e);
                false
            }
        }
    }

    async fn get_role(&self, email: &str) -> Option<Role> {
        sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_role error: {:?}", e);
                None
            })
    }

    async fn get_admins(&self) -> Vec<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE role = 'admin' ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_admins error: {:?}", e);
            vec![]
        })
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Option<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (token, user_id, expires)
            VALUES ($1, $2, $3)
            RETURNING token, user_id, expires
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(expires)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_session error: {:?}", e);
            None
        })
    }

    /// get_session_user
    ///
    /// Joins the session row to its user and enforces expiry in the query itself,
    /// so an expired token behaves exactly like an unknown one.
    async fn get_session_user(&self, token: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT u.{}
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.token = $1 AND s.expires > NOW()
            "#,
            USER_COLUMNS.replace(", ", ", u.")
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_session_user error: {:?}", e);
            None
        })
    }

    async fn delete_session(&self, token: &str) -> bool {
        match sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_session error: {:?}", e);
                false
            }
        }
    }
}

// --- The Mock Implementation (For Unit/Router Tests) ---

/// MockRepository
///
/// An in-memory implementation of `Repository` used exclusively for testing. Allows
/// router-level tests to exercise the gate, the session oracle, and the sign-in
/// callback without a running Postgres instance.
#[derive(Default)]
pub struct MockRepository {
    users: Mutex<HashMap<Uuid, User>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user directly, bypassing the sign-in flow.
    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().insert(user.id, user);
        self
    }

    /// Seeds a non-expired session for the given user.
    pub fn with_session(self, token: &str, user_id: Uuid) -> Self {
        self.sessions.lock().unwrap().insert(
            token.to_string(),
            Session {
                token: token.to_string(),
                user_id,
                expires: Utc::now() + chrono::Duration::days(30),
            },
        );
        self
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    async fn upsert_user(&self, identity: &AuthenticatedIdentity, role: Role) -> Option<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.values_mut().find(|u| u.email == identity.email) {
            existing.name = identity.name.clone();
            existing.image = identity.image.clone();
            existing.provider = identity.provider.clone();
            existing.role = role;
            return Some(existing.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            image: identity.image.clone(),
            provider: identity.provider.clone(),
            role,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Some(user)
    }

    async fn set_role(&self, email: &str, role: Role) -> bool {
        let mut users = self.users.lock().unwrap();
        match users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    async fn get_role(&self, email: &str) -> Option<Role> {
        self.get_user_by_email(email).await.map(|u| u.role)
    }

    async fn get_admins(&self) -> Vec<User> {
        let mut admins: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.role == Role::Admin)
            .cloned()
            .collect();
        admins.sort_by_key(|u| u.created_at);
        admins
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Option<Session> {
        let session = Session {
            token: token.to_string(),
            user_id,
            expires,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(token.to_string(), session.clone());
        Some(session)
    }

    async fn get_session_user(&self, token: &str) -> Option<User> {
        let session = self.sessions.lock().unwrap().get(token).cloned()?;
        if session.expires <= Utc::now() {
            return None;
        }
        self.get_user(session.user_id).await
    }

    async fn delete_session(&self, token: &str) -> bool {
        self.sessions.lock().unwrap().remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            image: None,
            provider: "google".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_by_email() {
        let repo = MockRepository::new();
        let created = repo.upsert_user(&identity("a@x.com"), Role::User).await.unwrap();
        let updated = repo.upsert_user(&identity("a@x.com"), Role::Admin).await.unwrap();
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn expired_sessions_resolve_to_none() {
        let repo = MockRepository::new();
        let user = repo.upsert_user(&identity("a@x.com"), Role::User).await.unwrap();
        repo.create_session(user.id, "stale", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(repo.get_session_user("stale").await.is_none());
    }

    #[tokio::test]
    async fn set_role_is_a_noop_for_unknown_email() {
        let repo = MockRepository::new();
        assert!(!repo.set_role("ghost@x.com", Role::Admin).await);
    }
}
