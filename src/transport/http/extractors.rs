use {
    super::errors::ApiError,
    crate::domain::{
        caller::{Caller, Role},
        error::OrderError,
        id::UserId,
    },
    axum::{extract::FromRequestParts, http::request::Parts},
    uuid::Uuid,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identity is established upstream; these headers are trusted as is.
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(UserId::from_uuid)
            .ok_or(OrderError::Unauthenticated)?;

        let role = match header(parts, USER_ROLE_HEADER) {
            None | Some("customer") => Role::Customer,
            Some("admin") => Role::Admin,
            Some(other) => {
                tracing::warn!(role = other, "unknown caller role");
                return Err(OrderError::Unauthenticated.into());
            }
        };

        Ok(Caller {
            user_id,
            role,
            email: header(parts, USER_EMAIL_HEADER).map(str::to_string),
            name: header(parts, USER_NAME_HEADER).map(str::to_string),
        })
    }
}
