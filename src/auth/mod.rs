/*!
 * # Authorization Module
 *
 * Sessions are issued and verified by the gateway in front of this service,
 * which forwards the caller's identity in trusted headers. This module turns
 * those headers into an explicit [`AuthUser`] value that is passed to every
 * service call; there is no process-wide auth state.
 *
 * - `x-user-id`: required, the acting user
 * - `x-user-name`: optional display name
 * - `x-user-roles`: comma-separated role names, expanded through [`RbacService`]
 * - `x-user-permissions`: comma-separated explicit permission strings
 */

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod permissions;
mod rbac;

pub use permissions::*;
pub use rbac::*;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const USER_PERMISSIONS_HEADER: &str = "x-user-permissions";

/// The acting user of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    /// Effective permissions: explicit grants plus role expansion
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Builds a user from roles and explicit permissions.
    pub fn new(
        user_id: impl Into<String>,
        roles: Vec<String>,
        explicit_permissions: Vec<String>,
    ) -> Self {
        let mut permissions = RbacService::new().get_permissions_for_roles(&roles);
        for perm in explicit_permissions {
            if !permissions.contains(&perm) {
                permissions.push(perm);
            }
        }
        Self {
            user_id: user_id.into(),
            name: None,
            roles,
            permissions,
        }
    }

    /// A user holding exactly `permissions` and no roles.
    pub fn with_permissions(user_id: impl Into<String>, permissions: &[&str]) -> Self {
        Self::new(
            user_id,
            Vec::new(),
            permissions.iter().map(|p| p.to_string()).collect(),
        )
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        has_permission(self, permission)
    }

    /// Fails with `Forbidden` unless the user holds `permission`.
    pub fn require(&self, permission: &str) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            debug!(user_id = %self.user_id, permission, "permission denied");
            Err(ServiceError::Forbidden(format!(
                "missing permission '{}'",
                permission
            )))
        }
    }

    /// Fails with `Forbidden` unless the user holds at least one of `permissions`.
    pub fn require_any(&self, permissions: &[&str]) -> Result<(), ServiceError> {
        if has_any_permission(self, permissions) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "requires one of: {}",
                permissions.join(", ")
            )))
        }
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, ServiceError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let list = |name: &str| -> Vec<String> {
            header(name)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized("missing x-user-id header".to_string()))?;

        let mut user = AuthUser::new(
            user_id,
            list(USER_ROLES_HEADER),
            list(USER_PERMISSIONS_HEADER),
        );
        user.name = header(USER_NAME_HEADER).map(ToString::to_string);
        Ok(user)
    }
}

impl PermissionHolder for AuthUser {
    fn permissions(&self) -> &[String] {
        &self.permissions
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers)
    }
}
