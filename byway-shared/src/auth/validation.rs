/// Input normalization shared by the registration and profile flows
///
/// Format checks live with the request handlers, which use the `validator`
/// crate.

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
