use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};

use crate::db::models::Role;
use crate::error::InvenError;
use crate::router::AppState;
use crate::service::sessions::SessionUser;

pub const CATALOG_WRITERS: &[Role] = &[Role::Admin, Role::Manager];
pub const TILL_OPERATORS: &[Role] = &[Role::Cashier, Role::Admin];
pub const MANAGERS: &[Role] = &[Role::Manager];

/// Pull the session token from the request.
/// Accepts, in order:
/// - Header: `Authorization: Bearer <token>`
/// - Header: `x-session-token: <token>`
/// - Query string: `?token=...` (phone scanners)
pub fn session_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && !token.trim().is_empty()
        {
            return Some(token.trim().to_string());
        }
    }

    if let Some(hv) = headers.get("x-session-token").and_then(|v| v.to_str().ok())
        && !hv.trim().is_empty()
    {
        return Some(hv.trim().to_string());
    }

    query.and_then(|qs| {
        url::form_urlencoded::parse(qs.as_bytes())
            .find(|(k, v)| k == "token" && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

/// The logged-in caller. Rejects with 401 when the token is missing or unknown.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: SessionUser,
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn require(&self, roles: &[Role]) -> Result<(), InvenError> {
        if roles.contains(&self.user.role) {
            Ok(())
        } else {
            Err(InvenError::Forbidden(self.user.role))
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = InvenError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers, parts.uri.query()).ok_or(InvenError::Unauthorized)?;
        let user = state
            .sessions
            .resolve(&token)
            .await
            .ok_or(InvenError::Unauthorized)?;
        Ok(Self { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_sources_in_priority_order() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers, Some("code=1&token=q")), Some("q".into()));
        assert_eq!(session_token(&headers, Some("token=")), None);

        headers.insert("x-session-token", HeaderValue::from_static("hdr"));
        assert_eq!(session_token(&headers, Some("token=q")), Some("hdr".into()));

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(session_token(&headers, Some("token=q")), Some("abc".into()));
    }
}
