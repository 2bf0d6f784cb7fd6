use crate::{
    AppState,
    auth::{self, AuthUser, SESSION_TTL_DAYS},
    i18n::ResolvedLocale,
    models::{
        AdminPage, DashboardPage, PageDocument, Role, RoleChangeRequest, SignInPage, UserProfile,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// SignInQuery
///
/// Accepted query parameters for the sign-in page. `callbackUrl` is the path the
/// gate attached when it denied a protected request.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SignInQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// CallbackQuery
///
/// What the OAuth provider sends back: the authorization code plus our `state`
/// value, which carries the callback path through the handshake.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

// --- Helpers ---

/// Where a fresh sign-in lands when no callback path was carried through the flow.
const DEFAULT_POST_SIGNIN_PATH: &str = "/dashboard";

/// sanitize_callback_url
///
/// Only same-site absolute paths are honored as post-sign-in targets; anything else
/// (absolute URLs, protocol-relative `//host` forms, empty values) falls back to the
/// dashboard. Prevents the callback parameter from becoming an open redirect.
fn sanitize_callback_url(raw: Option<&str>) -> &str {
    match raw {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => DEFAULT_POST_SIGNIN_PATH,
    }
}

/// page
///
/// Renders a generic localized page document from the given catalog namespace.
fn page(state: &AppState, locale: &str, namespace: &str) -> PageDocument {
    PageDocument {
        locale: locale.to_string(),
        title: state.catalogs.translate(locale, &format!("{}.title", namespace)),
        body: state.catalogs.translate(locale, &format!("{}.body", namespace)),
    }
}

/// error_redirect
///
/// The single degraded answer for every sign-in flow failure.
fn error_redirect() -> Response {
    Redirect::to("/auth/error").into_response()
}

// --- Public Pages ---

/// home
///
/// [Public Route] The localized landing page. The active locale arrives in the
/// `ResolvedLocale` extension attached by the gate.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home page", body = PageDocument))
)]
pub async fn home(
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Json<PageDocument> {
    Json(page(&state, &resolved.locale, "Home"))
}

/// about
///
/// [Public Route] Localized about page.
#[utoipa::path(
    get,
    path = "/about",
    responses((status = 200, description = "About page", body = PageDocument))
)]
pub async fn about(
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Json<PageDocument> {
    Json(page(&state, &resolved.locale, "About"))
}

/// contact
///
/// [Public Route] Localized contact page.
#[utoipa::path(
    get,
    path = "/contact",
    responses((status = 200, description = "Contact page", body = PageDocument))
)]
pub async fn contact(
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Json<PageDocument> {
    Json(page(&state, &resolved.locale, "Contact"))
}

/// auth_error
///
/// [Public Route] The generic error page every failure tier terminates at.
#[utoipa::path(
    get,
    path = "/auth/error",
    responses((status = 200, description = "Error page", body = PageDocument))
)]
pub async fn auth_error(
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Json<PageDocument> {
    Json(page(&state, &resolved.locale, "AuthError"))
}

/// signin_page
///
/// [Public Route] Serves the sign-in document: localized copy plus the provider
/// authorize URL. The callback path rides along as OAuth `state` so the user
/// returns to the page they were originally denied.
#[utoipa::path(
    get,
    path = "/auth/signin",
    params(SignInQuery),
    responses((status = 200, description = "Sign-in page", body = SignInPage))
)]
pub async fn signin_page(
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
    Query(query): Query<SignInQuery>,
) -> Json<SignInPage> {
    let callback_url = sanitize_callback_url(query.callback_url.as_deref()).to_string();
    Json(SignInPage {
        locale: resolved.locale.clone(),
        title: state.catalogs.translate(&resolved.locale, "Auth.signInTitle"),
        authorize_url: state.provider.authorize_url(&callback_url),
        callback_url,
    })
}

/// oauth_callback
///
/// [Public Route] Completes the sign-in flow once the provider redirects back.
///
/// *Flow*:
/// 1. Exchange the authorization code for a verified identity (external capability).
/// 2. Enforce the email-linking policy: merging an existing account registered
///    under a different provider requires the explicit
///    `allow_dangerous_email_linking` flag.
/// 3. Apply the admin allow-list: a listed email is promoted on upsert; otherwise an
///    existing user keeps their stored role and a new user starts as `user`.
/// 4. Create the database session, set the cookie, and return the user to the
///    sanitized callback path.
///
/// Every failure degrades to a redirect to the error page; nothing is retried.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses((status = 303, description = "Signed in, redirecting to the callback path"))
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = query.code else {
        return error_redirect();
    };

    let identity = match state.provider.exchange_code(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("Identity exchange failed: {}", e);
            return error_redirect();
        }
    };

    // Linking policy: the merge-by-email trust decision is explicit configuration.
    let existing = state.repo.get_user_by_email(&identity.email).await;
    if let Some(existing_user) = &existing {
        if existing_user.provider != identity.provider
            && !state.config.allow_dangerous_email_linking
        {
            tracing::warn!(
                "Refused cross-provider linking for {} ({} -> {})",
                identity.email,
                existing_user.provider,
                identity.provider
            );
            return error_redirect();
        }
    }

    // Allow-list promotion happens here, at sign-in; demotions are only ever explicit.
    let role = if state.config.is_admin_email(&identity.email) {
        Role::Admin
    } else {
        existing.map(|u| u.role).unwrap_or(Role::User)
    };

    let Some(user) = state.repo.upsert_user(&identity, role).await else {
        return error_redirect();
    };

    let token = Uuid::new_v4().to_string();
    let expires = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    if state
        .repo
        .create_session(user.id, &token, expires)
        .await
        .is_none()
    {
        return error_redirect();
    }

    tracing::info!("User {} signed in with role {:?}", user.email, user.role);

    let jar = jar.add(auth::build_session_cookie(&state.config, token));
    let target = sanitize_callback_url(query.state.as_deref()).to_string();
    (jar, Redirect::to(&target)).into_response()
}

/// signout
///
/// [Public Route] Destroys the database session (if any), clears the cookie, and
/// sends the user home. Safe to call without a session.
#[utoipa::path(
    get,
    path = "/auth/signout",
    responses((status = 303, description = "Signed out, redirecting home"))
)]
pub async fn signout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    // Destroy every session named by either cookie variant.
    for name in [auth::SESSION_COOKIE, auth::SECURE_SESSION_COOKIE] {
        if let Some(token) = jar.get(name).map(|cookie| cookie.value().to_string()) {
            state.repo.delete_session(&token).await;
        }
    }

    // Clear both variants; the gate's presence check accepts either.
    let jar = jar
        .remove(auth::removal_cookie(auth::SESSION_COOKIE))
        .remove(auth::removal_cookie(auth::SECURE_SESSION_COOKIE));
    (jar, Redirect::to("/"))
}

// --- Authenticated Pages ---

/// dashboard_page
///
/// [Protected Route] The authenticated dashboard. The gate already required cookie
/// *presence*; this is the authoritative session check. An invalid or expired
/// session redirects to the site root rather than answering 401, because this is a
/// page, not an API.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardPage),
        (status = 303, description = "No valid session, redirected home")
    )
)]
pub async fn dashboard_page(
    auth: Result<AuthUser, StatusCode>,
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Response {
    let Ok(auth_user) = auth else {
        return Redirect::to("/").into_response();
    };

    let profile = match state.repo.get_user(auth_user.id).await {
        Some(user) => UserProfile::from(user),
        None => return Redirect::to("/").into_response(),
    };

    let display_name = auth_user.name.unwrap_or_else(|| auth_user.email.clone());
    let welcome = state
        .catalogs
        .translate(&resolved.locale, "Dashboard.welcome")
        .replace("{name}", &display_name);

    Json(DashboardPage {
        locale: resolved.locale.clone(),
        title: state.catalogs.translate(&resolved.locale, "Dashboard.title"),
        welcome,
        user: profile,
    })
    .into_response()
}

/// get_me
///
/// [Authenticated Route] The authenticated user's profile. API-shaped, so a missing
/// or invalid session rejects with 401 via the extractor instead of redirecting.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    // The user row can vanish between session creation and now; treat that like an
    // invalid session.
    let user = state
        .repo
        .get_user(id)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(UserProfile::from(user)))
}

// --- Admin Area ---

/// admin_page
///
/// [Admin Route] The admin area page. Admission requires the page layer's role
/// check: a missing session or a non-admin role redirects to the site root, exactly
/// as the gate's cheaper cookie-presence check promised it would be re-verified.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Admin page", body = AdminPage),
        (status = 303, description = "Not an admin, redirected home")
    )
)]
pub async fn admin_page(
    auth: Result<AuthUser, StatusCode>,
    Extension(resolved): Extension<ResolvedLocale>,
    State(state): State<AppState>,
) -> Response {
    let auth_user = match auth {
        Ok(user) if user.role == Role::Admin => user,
        _ => return Redirect::to("/").into_response(),
    };

    let admins = state
        .repo
        .get_admins()
        .await
        .into_iter()
        .map(UserProfile::from)
        .collect();

    let display_name = auth_user.name.unwrap_or_else(|| auth_user.email.clone());
    let welcome = state
        .catalogs
        .translate(&resolved.locale, "Admin.welcome")
        .replace("{name}", &display_name);

    Json(AdminPage {
        locale: resolved.locale.clone(),
        title: state.catalogs.translate(&resolved.locale, "Admin.title"),
        welcome,
        admins,
    })
    .into_response()
}

/// list_admins
///
/// [Admin Route] Lists every user holding the admin role.
///
/// *RBAC*: strict enforcement of the admin role before touching the repository.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Current administrators", body = [UserProfile]))
)]
pub async fn list_admins(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    let admins = state
        .repo
        .get_admins()
        .await
        .into_iter()
        .map(UserProfile::from)
        .collect();
    Ok(Json(admins))
}

/// promote_user
///
/// [Admin Route] Explicit administrative promotion of a user to the admin role,
/// targeted by email. 404 if the email is unknown.
#[utoipa::path(
    post,
    path = "/admin/users/promote",
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Promoted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn promote_user(
    AuthUser { role, email, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RoleChangeRequest>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.set_role(&payload.email, Role::Admin).await {
        tracing::info!("{} promoted {} to admin", email, payload.email);
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// demote_user
///
/// [Admin Route] Explicit demotion back to the standard role. The counterpart to
/// `promote_user`; the allow-list never demotes anyone on its own.
#[utoipa::path(
    post,
    path = "/admin/users/demote",
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Demoted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn demote_user(
    AuthUser { role, email, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RoleChangeRequest>,
) -> StatusCode {
    if role != Role::Admin {
        return StatusCode::FORBIDDEN;
    }
    if state.repo.set_role(&payload.email, Role::User).await {
        tracing::info!("{} demoted {} to user", email, payload.email);
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// get_user_role
///
/// [Admin Route] Looks up a user's current role by email.
#[utoipa::path(
    get,
    path = "/admin/users/{email}/role",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Unknown email")
    )
)]
pub async fn get_user_role(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Role>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    match state.repo.get_role(&email).await {
        Some(found) => Ok(Json(found)),
        None => Err(StatusCode::NOT_FOUND),
    }
}
