use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'admin' role.
///
/// Access Control:
/// The gate guarantees only that a session cookie was *present* for `/admin` paths.
/// Every handler here re-derives the session through the `AuthUser` extractor and
/// explicitly verifies `role == Role::Admin` before doing anything. The page
/// redirects non-admins to the site root; the API endpoints answer 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // The admin area page: localized copy plus the current administrator roster.
        // Authenticated non-admins are redirected to `/` by the handler.
        .route("/", get(handlers::admin_page))
        // GET /admin/users
        // Lists every user currently holding the admin role.
        .route("/users", get(handlers::list_admins))
        // POST /admin/users/promote, POST /admin/users/demote
        // Explicit role mutation by email. These are the only role changes besides
        // the sign-in allow-list promotion.
        .route("/users/promote", post(handlers::promote_user))
        .route("/users/demote", post(handlers::demote_user))
        // GET /admin/users/{email}/role
        // Looks up a single user's current role.
        .route("/users/{email}/role", get(handlers::get_user_role))
}
