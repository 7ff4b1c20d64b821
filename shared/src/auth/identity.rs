//! Identity loading and the role gate

use crate::error::ApiError;
use crate::store::Store;
use crate::types::{Role, User};

/// Resolve a verified subject to its persisted user.
///
/// Tokens outlive account deletion, so a missing user is an ordinary
/// `IdentityNotFound`. Store failures stay `PersistenceUnavailable`.
pub async fn load_identity(store: &dyn Store, subject: &str) -> Result<User, ApiError> {
    store
        .find_user_by_id(subject)
        .await?
        .ok_or(ApiError::IdentityNotFound)
}

/// Exact-match role check. `admin` does not satisfy a `creator` requirement.
pub fn authorize(user: &User, required: Role) -> Result<(), ApiError> {
    if user.role == required {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
