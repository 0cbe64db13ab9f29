/// Role and enrollment checks
///
/// ByWay has two roles: `user` (learners) and `admin` (course authors and
/// platform operators). Course material beyond the public view is gated on
/// enrollment rather than role.
///
/// # Example
///
/// ```
/// use byway_shared::auth::authorization::require_role;
/// use byway_shared::models::user::UserRole;
///
/// assert!(require_role(UserRole::Admin, &[UserRole::Admin]).is_ok());
/// assert!(require_role(UserRole::User, &[UserRole::Admin]).is_err());
/// ```

use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    /// Role not in the allowed set
    #[error("Role: {role} is restricted to access this")]
    RoleRestricted { role: UserRole },

    /// User has not purchased the course
    #[error("User is not enrolled in course {0}")]
    NotEnrolled(Uuid),
}

/// Fails unless `role` is one of `allowed`
pub fn require_role(role: UserRole, allowed: &[UserRole]) -> Result<(), AuthzError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::RoleRestricted { role })
    }
}

/// Fails unless the user holds an enrollment for `course_id`
pub fn require_enrollment(user: &User, course_id: Uuid) -> Result<(), AuthzError> {
    if user.is_enrolled(course_id) {
        Ok(())
    } else {
        Err(AuthzError::NotEnrolled(course_id))
    }
}
