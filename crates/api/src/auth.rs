//! Caller identity extraction.
//!
//! Authentication happens upstream. The gateway forwards the verified
//! caller in three headers, which are trusted as given:
//!
//! - `x-user-id`: the user's UUID
//! - `x-user-role`: `admin`, `manager` or `staff`
//! - `x-user-permissions`: comma-separated permission names

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::UserId;
use domain::{Permission, Principal, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_PERMISSIONS_HEADER: &str = "x-user-permissions";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers).map(Authenticated)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing user identity".to_string()))?;
    let user_id = UserId::parse(user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid user identity".to_string()))?;

    let role: Role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing user role".to_string()))?
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid user role".to_string()))?;

    let permissions = header(headers, USER_PERMISSIONS_HEADER)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<Permission>()
                .map_err(|_| ApiError::Unauthorized(format!("Invalid permission: {p}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Principal::new(user_id, role, permissions))
}

/// Passes if the principal holds any of `required`.
pub fn require(principal: &Principal, required: &[Permission]) -> Result<(), ApiError> {
    if principal.has_any(required) {
        return Ok(());
    }
    let names: Vec<&str> = required.iter().map(Permission::as_str).collect();
    Err(ApiError::Forbidden(format!(
        "Missing required permission: {}",
        names.join(" or ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_parses_full_identity() {
        let id = UserId::new();
        let map = headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "Staff"),
            (USER_PERMISSIONS_HEADER, "order.create, order.view"),
        ]);

        let principal = principal_from_headers(&map).unwrap();

        assert_eq!(principal.user_id, id);
        assert_eq!(principal.role, Role::Staff);
        assert!(principal.has(Permission::OrderCreate));
        assert!(principal.has(Permission::OrderView));
        assert!(!principal.has(Permission::OrderManage));
    }

    #[test]
    fn test_missing_or_malformed_identity_is_unauthorized() {
        assert!(matches!(
            principal_from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            principal_from_headers(&headers(&[
                (USER_ID_HEADER, "not-a-uuid"),
                (USER_ROLE_HEADER, "staff"),
            ])),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            principal_from_headers(&headers(&[
                (USER_ID_HEADER, &UserId::new().to_string()),
                (USER_ROLE_HEADER, "staff"),
                (USER_PERMISSIONS_HEADER, "order.fly"),
            ])),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_require_accepts_any_listed_permission() {
        let principal = Principal::new(UserId::new(), Role::Staff, [Permission::OrderCreate]);

        assert!(require(&principal, &[Permission::OrderView, Permission::OrderCreate]).is_ok());
        assert!(matches!(
            require(&principal, &[Permission::StockAdjust]),
            Err(ApiError::Forbidden(_))
        ));
        assert!(require(&Principal::admin(UserId::new()), &[Permission::StockAdjust]).is_ok());
    }
}
