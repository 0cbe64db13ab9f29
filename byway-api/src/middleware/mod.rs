/// Request guards
///
/// Applied outermost first:
/// - `rate_limit`: per-IP token bucket in Redis
/// - `protect_db`: canned replies for demo traffic in production
/// - `consent`: `x-cookie-consent` header check
/// - `auth`: access cookie session and admin role

pub mod auth;
pub mod consent;
pub mod protect_db;
pub mod rate_limit;
