/// Router Module Index
///
/// Routes are split by how access is enforced. Authentication is applied per module with an
/// axum layer, so a handler cannot end up exposed by being registered in the wrong place.

/// Routes open to anonymous clients: health, registration, login, and read-only campus data.
pub mod public;

/// Routes behind the `AuthUser` middleware. Ownership, approver and visibility rules are
/// checked inside the handlers against the verified actor.
pub mod authenticated;

/// Routes restricted to the `admin` role, nested under `/admin`.
pub mod admin;
