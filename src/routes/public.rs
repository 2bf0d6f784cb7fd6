use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in): the localized pages and the entire sign-in/sign-out
/// flow. The gate applies locale resolution and security headers to all of these
/// but never consults credentials, regardless of cookie state.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // The localized landing page. Public by the exact-root rule.
        .route("/", get(handlers::home))
        // GET /about, GET /contact
        // Localized informational pages, public by prefix.
        .route("/about", get(handlers::about))
        .route("/contact", get(handlers::contact))
        // GET /auth/signin?callbackUrl=...
        // Serves the provider authorize URL. The callback path the gate attached is
        // threaded through the OAuth handshake as `state`.
        .route("/auth/signin", get(handlers::signin_page))
        // GET /auth/callback?code=...&state=...
        // Completes the handshake: identity exchange, allow-list promotion, session
        // creation, cookie, and redirect back to the callback path.
        .route("/auth/callback", get(handlers::oauth_callback))
        // GET /auth/signout
        // Destroys the session and clears the cookie.
        .route("/auth/signout", get(handlers::signout))
        // GET /auth/error
        // The terminal page every sign-in failure tier redirects to.
        .route("/auth/error", get(handlers::auth_error))
}
