/// Role-based authorization checks
///
/// # Permission Model
///
/// - **admin**: everything, including bans and role changes
/// - **moderator**: may edit and delete any comment
/// - **user**: may edit own comments, manage own images
///
/// # Example
///
/// ```no_run
/// use photoshare_shared::auth::authorization::{require_admin, require_comment_editor};
/// use photoshare_shared::auth::middleware::AuthContext;
/// use uuid::Uuid;
///
/// fn check(auth: &AuthContext, comment_author: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     require_comment_editor(auth, comment_author)?;
///     require_admin(auth)?;
///     Ok(())
/// }
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::Role;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthzError {
    /// User's role is not in the allowed set
    #[error("Insufficient permissions: requires one of {allowed:?}, has {actual:?}")]
    InsufficientRole { allowed: Vec<Role>, actual: Role },

    /// User is neither the owner nor staff
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    /// Admin action aimed at the admin's own account
    #[error("This action cannot target your own account")]
    SelfTarget,
}

/// Checks that the current user has one of `allowed` roles
pub fn require_role(auth: &AuthContext, allowed: &[Role]) -> Result<(), AuthzError> {
    let actual = auth.role();

    if !allowed.contains(&actual) {
        tracing::debug!(user_id = %auth.user_id(), role = %actual, "Role check failed");
        return Err(AuthzError::InsufficientRole {
            allowed: allowed.to_vec(),
            actual,
        });
    }

    Ok(())
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, &[Role::Admin])
}

pub fn require_staff(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, &[Role::Admin, Role::Moderator])
}

/// A comment may be edited by its author or by staff
pub fn require_comment_editor(auth: &AuthContext, author_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id() == author_id || auth.role().is_staff() {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized)
}

/// Rejects admin actions whose target is the caller
pub fn require_not_self(auth: &AuthContext, target_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id() == target_id {
        return Err(AuthzError::SelfTarget);
    }

    Ok(())
}
