/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password strength rule
/// - [`jwt`]: access, refresh and activation tokens
/// - [`validation`]: email normalization
/// - [`authorization`]: role and enrollment checks
///
/// HTTP concerns (cookies, extractors, middleware) live in `byway-api`; this
/// module stays free of any web framework types so the worker can link it.
///
/// # Example
///
/// ```no_run
/// use byway_shared::auth::jwt::{issue_session, SessionKeys};
/// use byway_shared::auth::password::{hash_password, verify_password};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("learning42")?;
/// assert!(verify_password("learning42", &hash)?);
///
/// let keys = SessionKeys {
///     access_secret: "access".into(),
///     refresh_secret: "refresh".into(),
///     access_ttl: Duration::minutes(59),
///     refresh_ttl: Duration::days(7),
/// };
/// let session = issue_session(Uuid::new_v4(), &keys)?;
/// println!("access token expires at {}", session.access_expires_at);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod password;
pub mod validation;
