use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::{Layer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod i18n;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use auth::{GoogleProvider, MockIdentityProvider, ProviderState};
pub use config::AppConfig;
pub use i18n::Catalogs;
pub use repository::{MockRepository, PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the application by
/// aggregating all paths and schemas decorated with the `#[utoipa::path]` and
/// `#[derive(utoipa::ToSchema)]` macros. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::about, handlers::contact, handlers::auth_error,
        handlers::signin_page, handlers::oauth_callback, handlers::signout,
        handlers::dashboard_page, handlers::get_me,
        handlers::admin_page, handlers::list_admins, handlers::promote_user,
        handlers::demote_user, handlers::get_user_role
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::RoleChangeRequest,
            models::PageDocument, models::SignInPage, models::DashboardPage,
            models::AdminPage,
        )
    ),
    tags(
        (name = "intl-portal", description = "Internationalized portal with OAuth sign-in and RBAC")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: the single, thread-safe, immutable
/// container holding all essential application services and configuration, shared
/// across all incoming requests. The gate, the extractors, and the handlers all read
/// from here; nothing reads ambient environment state at request time.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: user store and database-backed sessions.
    pub repo: RepositoryState,
    /// Identity Provider: the OAuth handshake boundary (Google in production, mock in tests).
    pub provider: ProviderState,
    /// Message Catalogs: per-locale translations, loaded once at startup.
    pub catalogs: Arc<Catalogs>,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow extractors to selectively pull components from the
// shared AppState, keeping dependency boundaries explicit.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for ProviderState {
    fn from_ref(app_state: &AppState) -> ProviderState {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies the gate and the
/// observability layers, and registers the application state.
///
/// Layering, outermost first: request-id + tracing + CORS, then the **Request Gate**
/// (so it classifies every request before any route matches and can rewrite
/// locale-prefixed URIs to their canonical form), then the tiered routers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routed Application Assembly. Route matching happens here, always against
    // canonical (locale-stripped) paths.
    let routed = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public tier: localized pages and the sign-in flow.
        .merge(public::public_routes())
        // Authenticated tier: dashboard page + profile API. The authoritative
        // session check happens in the handlers via the AuthUser extractor; the
        // gate only guaranteed cookie presence.
        .merge(authenticated::authenticated_routes())
        // Admin tier: nested under '/admin'. The role check is performed *inside*
        // the handlers, after the session oracle resolves the live role.
        .nest("/admin", admin::admin_routes())
        // Apply the Unified State to all routes.
        .with_state(state.clone());

    // 3. The Request Gate wraps the *finished* router: a middleware added with
    // `Router::layer` runs after route matching, so its canonical-path rewrite
    // could never influence which route matches. Mounting the wrapped service as
    // the fallback of a fresh Router sends every request through the gate first
    // while the assembled application stays a plain `Router`.
    let gated = middleware::from_fn_with_state(state, gate::request_gate).layer(routed);

    // 4. Observability and Correlation Layers (Applied outermost/first)
    Router::new()
        .fallback_service(gated)
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: wraps the request/response lifecycle in a span
                // correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: returns the x-request-id header to the
                // client and downstream calls.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Helper used by `TraceLayer` to customize span creation: includes the
/// `x-request-id` header (if present) alongside the HTTP method and URI, so every
/// log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
