//! User API endpoints

use serde::Serialize;
use uuid::Uuid;

use crate::storage::Storage;
use crate::users::User;

use super::CurrentUser;
use super::Error;
use super::Success;

/// The user response information
///
/// A subset of all the information, ready to be serialized for the outside
/// world
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// The user ID
    pub id: Uuid,

    /// Sign-in address
    pub email: String,

    /// Optional display name
    pub name: Option<String>,
}

impl UserResponse {
    /// Create a user response from a [`User`](User)
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Get the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:7100/api/me
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "<uuid>", "email": "someone@example.com" }, "error": null }
/// ```
pub async fn me<S: Storage>(
    current_user: CurrentUser<S>,
) -> Result<Success<UserResponse>, Error> {
    Ok(Success::ok(UserResponse::from_user(&current_user)))
}
