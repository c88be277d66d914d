//! Caller identity forwarded by the upstream auth gateway.
//!
//! Token verification happens before requests reach this service; handlers
//! only see the resulting `X-User-Id` and `X-User-Role` headers.

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Staff,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Staff => write!(f, "staff"),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require(Role::Admin)
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        self.require(Role::Staff)
    }

    fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("{role} role required")))
        }
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
        };

        let user_id = header(USER_ID_HEADER)?
            .parse::<UserId>()
            .ok()
            .filter(|id| id.as_i64() > 0)
            .ok_or_else(|| ApiError::Unauthorized("invalid user id".to_string()))?;

        let role = match header(USER_ROLE_HEADER)? {
            "admin" => Role::Admin,
            "staff" => Role::Staff,
            _ => return Err(ApiError::Unauthorized("unknown role".to_string())),
        };

        Ok(Self { user_id, role })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Principal::from_headers(&parts.headers)
    }
}
