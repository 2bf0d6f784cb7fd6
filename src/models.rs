use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed role enumeration used for Role-Based Access Control. Kept as a sum type
/// rather than a free-form string so invalid role states are unrepresentable: a user is
/// either a standard `user` or an `admin`, nothing else.
///
/// Maps to the `user_role` Postgres enum and serializes lowercase on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User
///
/// The canonical identity record stored in the `users` table. Created on first
/// successful sign-in; the role is mutated only by the sign-in callback (allow-list
/// promotion) or by explicit administrative promotion/demotion.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // The user's primary identifier; unique across providers.
    pub email: String,
    pub name: Option<String>,
    // Avatar URL supplied by the OAuth provider.
    pub image: Option<String>,
    // Which OAuth provider this identity arrived through (e.g., "google").
    pub provider: String,
    // The RBAC field.
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Session
///
/// A database-backed session row. The `token` is an opaque value stored in the
/// session cookie; nothing about it is self-describing, so a lookup is always
/// required to resolve the user and their current role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

/// AuthenticatedIdentity
///
/// What the identity provider boundary yields after a successful OAuth exchange:
/// a verified email plus optional display data. This is the entire contract the
/// rest of the application has with the OAuth handshake.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthenticatedIdentity {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub provider: String,
}

// --- Request Payloads (Input Schemas) ---

/// RoleChangeRequest
///
/// Input payload for the administrative promote/demote endpoints. Targets a user
/// by email, mirroring the allow-list convention used at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleChangeRequest {
    pub email: String,
}

// --- Page Documents (Output Schemas) ---
// UI rendering is out of scope; page handlers return localized JSON documents
// that a frontend can present directly.

/// PageDocument
///
/// Generic localized page payload for the simple public pages (home, about, contact,
/// error). The strings come from the active locale's message catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PageDocument {
    pub locale: String,
    pub title: String,
    pub body: String,
}

/// SignInPage
///
/// Document served by the sign-in page: localized copy plus the provider authorize
/// URL the client should follow. The original `callbackUrl` rides along as OAuth
/// state so the user returns to the page they were denied.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInPage {
    pub locale: String,
    pub title: String,
    pub authorize_url: String,
    pub callback_url: String,
}

/// DashboardPage
///
/// Document for the authenticated dashboard: greeting plus the viewer's profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardPage {
    pub locale: String,
    pub title: String,
    pub welcome: String,
    pub user: UserProfile,
}

/// AdminPage
///
/// Document for the admin area: localized copy plus the current administrator roster.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminPage {
    pub locale: String,
    pub title: String,
    pub welcome: String,
    pub admins: Vec<UserProfile>,
}

/// UserProfile
///
/// Output schema for user data exposed to the frontend (GET /me, page documents).
/// A trimmed view of the internal `User` row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            image: user.image,
            role: user.role,
        }
    }
}
