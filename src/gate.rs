use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;

use crate::{
    AppState,
    auth::{SECURE_SESSION_COOKIE, SESSION_COOKIE},
    config::AppConfig,
    i18n::{self, ResolvedLocale},
};

/// Request Gate
///
/// The edge middleware applied to the entire router. For every inbound request it
/// classifies the path and enforces the minimum access rule before the page layer
/// performs the authoritative, fine-grained role check:
///
/// 1. **Bypass**: asset/API paths pass through completely untouched.
/// 2. **Locale normalization**: a recognized locale prefix is stripped; the request
///    URI is rewritten to the canonical path and a `ResolvedLocale` extension is
///    attached so handlers know the active locale.
/// 3. **Public pages**: locale handling only; no credential check, regardless of
///    cookie state.
/// 4. **Protected routes** (`/dashboard`, `/admin`): a cookie-**presence** check
///    only. The gate never decodes or validates the token; that is the `AuthUser`
///    oracle's job at the page layer, where a failure is cheap to recover from.
/// 5. Every non-bypass response gets the security header set attached.
///
/// No failure here may crash a user-facing request: classification errors degrade to
/// bare locale resolution, and if that also fails the request is redirected to the
/// static error page. Each failure has exactly one fallback tier, nothing is retried.
pub async fn request_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // 1. Bypass test. Must run first and short-circuit: asset requests are never
    // redirected, rewritten, or decorated with headers.
    if is_bypass_path(req.uri().path()) {
        return next.run(req).await;
    }

    let outcome = match classify(&state.config, req) {
        Ok(outcome) => outcome,
        Err((err, req)) => {
            tracing::error!("Gate classification failed: {}", err);
            // Degraded service: bare locale resolution, skipping access control for
            // classification (the page layer still enforces the real session check).
            degraded_decision(resolve_locale_only(&state.config, req))
        }
    };

    match outcome {
        GateOutcome::Forward(req) => add_security_headers(next.run(req).await),
        GateOutcome::Respond(response) => add_security_headers(response),
    }
}

/// GateOutcome
///
/// What classification decided: hand the (possibly rewritten) request to the router,
/// or answer immediately with a redirect.
enum GateOutcome {
    Forward(Request),
    Respond(Response),
}

/// classify
///
/// Steps 2-4 of the gate algorithm. Takes ownership of the request so the error arm
/// can hand it back for the degraded path.
fn classify(config: &AppConfig, mut req: Request) -> Result<GateOutcome, (String, Request)> {
    let original_path = req.uri().path().to_string();

    // 2. Locale normalization. Pure and idempotent; an unrecognized prefix leaves
    // the path untouched and selects the default locale.
    let resolved = i18n::resolve(&original_path, config);

    // 3. Public-page test on the canonical path: no credential check occurs.
    if is_public_page(&resolved.canonical_path, config) {
        return match apply_locale(&mut req, resolved) {
            Ok(()) => Ok(GateOutcome::Forward(req)),
            Err(e) => Err((e, req)),
        };
    }

    // 4. Protected-route test: presence of either session cookie variant is
    // necessary to proceed. Validity is decided downstream by the session oracle.
    if is_protected_route(&resolved.canonical_path) && !has_session_cookie(&req) {
        let locale = i18n::extract_locale(&original_path, &config.locales)
            .unwrap_or(&config.default_locale);
        return match signin_redirect(locale, &original_path) {
            Ok(response) => Ok(GateOutcome::Respond(response)),
            Err(e) => Err((e, req)),
        };
    }

    // 5. Everything else (including credentialed protected requests) continues to
    // the router under locale resolution.
    match apply_locale(&mut req, resolved) {
        Ok(()) => Ok(GateOutcome::Forward(req)),
        Err(e) => Err((e, req)),
    }
}

// --- Path Classification Helpers ---

/// Prefixes excluded from all gate processing: API routes, server-internal static
/// paths, and the well-known root files browsers fetch on their own.
const BYPASS_PREFIXES: [&str; 7] = [
    "/api/", "/static/", "/assets/", "/favicon", "/robots", "/sitemap", "/manifest",
];

/// Prefixes of the canonical paths that require a session.
const DASHBOARD_PREFIX: &str = "/dashboard";
const ADMIN_PREFIX: &str = "/admin";

/// Common static-asset extensions, matched case-insensitively at the end of the path.
static ASSET_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(ico|png|jpg|jpeg|svg|gif|webp|js|css|woff|woff2|ttf|eot)$")
        .expect("asset extension pattern is valid")
});

/// is_bypass_path
///
/// True for paths the gate must pass through unchanged.
pub fn is_bypass_path(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || ASSET_EXTENSION.is_match(path)
}

/// is_public_page
///
/// A canonical path is public if it is the site root exactly, or starts with one of
/// the declared public prefixes (sign-in, error, sign-out, about, contact).
pub fn is_public_page(canonical_path: &str, config: &AppConfig) -> bool {
    canonical_path == "/"
        || config
            .public_pages
            .iter()
            .any(|page| canonical_path.starts_with(page.as_str()))
}

/// is_protected_route
///
/// A canonical path is protected if it lives under the dashboard or admin area.
/// Classification always runs on the locale-normalized path, so `/dashboard`,
/// `/en/dashboard` and `/tr/admin` are all protected, while a path with an
/// unrecognized locale-looking prefix (`/fr/admin`) is not: it normalizes to itself
/// and 404s at the router.
pub fn is_protected_route(canonical_path: &str) -> bool {
    canonical_path.starts_with(DASHBOARD_PREFIX) || canonical_path.starts_with(ADMIN_PREFIX)
}

/// has_session_cookie
///
/// Presence-only check for either session cookie variant. The gate deliberately
/// never decodes the token.
fn has_session_cookie(req: &Request) -> bool {
    let jar = CookieJar::from_headers(req.headers());
    jar.get(SESSION_COOKIE).is_some() || jar.get(SECURE_SESSION_COOKIE).is_some()
}

// --- Request / Response Plumbing ---

/// apply_locale
///
/// Rewrites the request URI to the canonical path (preserving the query string) and
/// attaches the `ResolvedLocale` extension. When no locale prefix was present the
/// URI is already canonical and only the extension is added.
fn apply_locale(req: &mut Request, resolved: ResolvedLocale) -> Result<(), String> {
    if req.uri().path() != resolved.canonical_path {
        let path_and_query = match req.uri().query() {
            Some(query) => format!("{}?{}", resolved.canonical_path, query),
            None => resolved.canonical_path.clone(),
        };
        let mut parts = req.uri().clone().into_parts();
        parts.path_and_query = Some(
            path_and_query
                .parse()
                .map_err(|e| format!("invalid canonical path '{}': {}", path_and_query, e))?,
        );
        *req.uri_mut() =
            Uri::from_parts(parts).map_err(|e| format!("uri reassembly failed: {}", e))?;
    }
    req.extensions_mut().insert(resolved);
    Ok(())
}

/// resolve_locale_only
///
/// Tier-one degraded service: locale resolution with no access-control
/// classification. The URI is still rewritten to the canonical path so the
/// request routes normally.
fn resolve_locale_only(config: &AppConfig, mut req: Request) -> Result<Request, String> {
    let resolved = i18n::resolve(req.uri().path(), config);
    apply_locale(&mut req, resolved)?;
    Ok(req)
}

/// degraded_decision
///
/// Turns the tier-one fallback result into a gate outcome: a request that still
/// resolved its locale continues to the router; if even that failed, the request
/// terminates at the static error page. Each failure has exactly one fallback
/// tier, nothing is retried.
fn degraded_decision(fallback: Result<Request, String>) -> GateOutcome {
    match fallback {
        Ok(req) => GateOutcome::Forward(req),
        Err(err) => {
            tracing::error!("Gate locale fallback failed: {}", err);
            GateOutcome::Respond(error_page_redirect())
        }
    }
}

/// Bytes that cannot ride raw inside a query value: controls plus the query and
/// fragment delimiters. `/` stays literal so the redirect target remains readable.
const QUERY_VALUE_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

/// signin_redirect
///
/// Builds the 307 redirect to the locale-qualified sign-in page, carrying the
/// original path as the callback parameter so the user returns to it after
/// authenticating. The path is percent-encoded as a query value; a `&` in a path
/// segment must not split the query string.
fn signin_redirect(locale: &str, original_path: &str) -> Result<Response, String> {
    let callback = utf8_percent_encode(original_path, QUERY_VALUE_ENCODE);
    let target = format!("/{}/auth/signin?callbackUrl={}", locale, callback);
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(
            header::LOCATION,
            header::HeaderValue::from_str(&target)
                .map_err(|e| format!("redirect target '{}': {}", target, e))?,
        )
        .body(Body::empty())
        .map_err(|e| format!("redirect response: {}", e))
}

/// error_page_redirect
///
/// Terminal fallback tier: a static redirect to the generic error page. Built from
/// constants, so it cannot fail.
fn error_page_redirect() -> Response {
    Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, header::HeaderValue::from_static("/auth/error"))
        .body(Body::empty())
        .unwrap_or_default()
}

/// add_security_headers
///
/// Attaches the baseline security header set to every processed (non-bypass)
/// response: content-type sniffing disabled, frame embedding denied, strict
/// referrer policy, DNS prefetch disabled.
fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::HeaderName::from_static("x-dns-prefetch-control"),
        header::HeaderValue::from_static("off"),
    );
    response
}
