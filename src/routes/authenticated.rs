use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Defines the routes that require a valid session. The gate has already redirected
/// cookie-less requests under `/dashboard` to the sign-in page; what remains here is
/// the authoritative check via the `AuthUser` extractor (the session/role oracle).
///
/// Access Control Strategy:
/// The two routes fail differently on purpose. `/dashboard` is a page, so an
/// invalid session degrades to a redirect home; `/me` is an API, so the extractor
/// rejects with 401 and the client handles it.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard
        // The authenticated landing area. The handler re-derives the session and
        // redirects to `/` when it is missing, expired, or orphaned.
        .route("/dashboard", get(handlers::dashboard_page))
        // GET /me
        // Retrieves the currently authenticated user's profile.
        .route("/me", get(handlers::get_me))
}
