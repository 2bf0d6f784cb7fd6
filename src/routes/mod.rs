/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// mirroring the three access tiers the gate classifies requests into. The gate
/// handles the coarse edge check (cookie presence); the handlers in each module
/// perform the authoritative session and role checks.
///
/// Handlers always see **canonical** paths: the gate strips any locale prefix and
/// attaches the active locale as a request extension before routing happens.

/// Routes accessible to everyone: localized pages and the sign-in/sign-out flow.
/// No credential check of any kind occurs here.
pub mod public;

/// Routes requiring a valid session: the dashboard page (redirects home when the
/// session is invalid) and the profile API (rejects with 401).
pub mod authenticated;

/// The admin area: page and user-role administration API, restricted to the
/// 'admin' role by explicit checks in every handler.
pub mod admin;
